//! Camera configuration dialog.

use std::sync::Arc;

use labpanel_core::bus::{live_devices_by_class, ChangeEvent, DeviceBus};
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::UserError;
use labpanel_core::reference::REFERENCE_OBJECT;
use labpanel_core::widget::AttributeWidget;

/// Camera class searched when `LaserCamera/CameraClasses` is empty.
pub const DEFAULT_CAMERA_CLASS: &str = "BaslerGigE";

/// Attributes exposed by the dialog.
pub const SETUP_ATTRIBUTES: [&str; 9] = [
    "ExposureTime",
    "Gain",
    "PixelFormat",
    "TriggerSource",
    "EnableTrigger",
    "AutoExposure",
    "AutoBrightnessTarget",
    "AutoExposureLowerLimit",
    "AutoExposureUpperLimit",
];

/// Camera classes from the database, or the default one.
pub fn camera_classes(bus: &dyn DeviceBus) -> Vec<String> {
    match bus.get_property(REFERENCE_OBJECT, "CameraClasses") {
        Ok(classes) if !classes.is_empty() => classes,
        Ok(_) => vec![DEFAULT_CAMERA_CLASS.to_string()],
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read camera classes");
            vec![DEFAULT_CAMERA_CLASS.to_string()]
        }
    }
}

/// Camera setup controller.
pub struct CameraSetup {
    bus: Arc<dyn DeviceBus>,
    sink: EventSink,
    /// Live cameras.
    pub cameras: Vec<String>,
    current: Option<String>,
    /// One widget per entry of [`SETUP_ATTRIBUTES`].
    pub widgets: Vec<AttributeWidget>,
}

impl CameraSetup {
    /// List the live cameras and select `camera` when present, the first one
    /// otherwise.
    pub fn open(bus: Arc<dyn DeviceBus>, camera: Option<&str>, sink: EventSink) -> Result<Self, UserError> {
        let mut cameras = Vec::new();
        for class in camera_classes(bus.as_ref()) {
            match live_devices_by_class(bus.as_ref(), &class) {
                Ok(found) => cameras.extend(found),
                Err(e) => tracing::error!(class = %class, error = %e, "Failed to list cameras"),
            }
        }
        if cameras.is_empty() {
            return Err(UserError::new(
                "No camera",
                "Cannot find any camera available. Cannot open configuration window",
            ));
        }
        let initial = camera
            .filter(|c| cameras.iter().any(|d| d.eq_ignore_ascii_case(c)))
            .map(str::to_string)
            .unwrap_or_else(|| cameras[0].clone());

        let mut setup = Self {
            bus,
            sink,
            cameras,
            current: None,
            widgets: Vec::new(),
        };
        setup.select(&initial);
        Ok(setup)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Rebind the widgets to another camera.
    pub fn select(&mut self, camera: &str) {
        if self.current.as_deref() == Some(camera) {
            return;
        }
        tracing::info!(camera, "Setting up camera");
        self.close_camera();
        self.widgets = SETUP_ATTRIBUTES
            .iter()
            .map(|attr| AttributeWidget::bind(self.bus.as_ref(), &format!("{}/{}", camera, attr), &self.sink))
            .collect();
        self.current = Some(camera.to_string());
    }

    /// Widget of one setup attribute.
    pub fn widget(&self, attribute: &str) -> Option<&AttributeWidget> {
        self.widgets
            .iter()
            .find(|w| w.attribute().eq_ignore_ascii_case(attribute))
    }

    pub fn widget_mut(&mut self, attribute: &str) -> Option<&mut AttributeWidget> {
        self.widgets
            .iter_mut()
            .find(|w| w.attribute().eq_ignore_ascii_case(attribute))
    }

    pub fn handle_event(&mut self, event: &ChangeEvent) {
        if let Some(widget) = self.widgets.iter_mut().find(|w| w.owns(event)) {
            widget.handle_event(event);
        }
    }

    fn close_camera(&mut self) {
        for widget in &mut self.widgets {
            widget.shutdown();
        }
        self.widgets.clear();
        self.current = None;
    }
}
