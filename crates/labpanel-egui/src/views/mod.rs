//! One renderer per panel controller.
//!
//! Controllers that need no state beyond their own fields implement
//! [`PanelView`](crate::shell::PanelView) directly; the others are wrapped
//! in a view struct holding the widget state egui needs between frames.

/// Forward the event plumbing of a [`labpanel_panels::Panel`] implementor.
macro_rules! forward_panel {
    () => {
        fn title(&self) -> String {
            labpanel_panels::Panel::title(self).to_string()
        }

        fn handle_event(&mut self, event: &labpanel_core::ChangeEvent) {
            labpanel_panels::Panel::handle_event(self, event)
        }

        fn tick(&mut self, now: std::time::Instant) {
            labpanel_panels::Panel::tick(self, now)
        }
    };
}

pub mod archiving;
pub mod browser;
pub mod camera;
pub mod camera_setup;
pub mod compressor;
pub mod cooling;
pub mod cryostat;
pub mod executer;
pub mod positioner;
pub mod spectrometer;
pub mod vacuum;

pub use archiving::ArchivingView;
pub use browser::BrowserView;
pub use camera::CameraView;
pub use camera_setup::CameraSetupView;
pub use executer::ExecuterView;
pub use spectrometer::SpectrometerView;
