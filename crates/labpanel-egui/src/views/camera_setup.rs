use eframe::egui;
use labpanel_core::ChangeEvent;
use labpanel_panels::CameraSetup;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::attribute;

pub struct CameraSetupView {
    setup: CameraSetup,
}

impl CameraSetupView {
    pub fn new(setup: CameraSetup) -> Self {
        Self { setup }
    }
}

impl PanelView for CameraSetupView {
    fn title(&self) -> String {
        match self.setup.current() {
            Some(camera) => format!("Camera setup - {}", camera),
            None => "Camera setup".to_string(),
        }
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        self.setup.handle_event(event);
    }

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        let current = self.setup.current().unwrap_or("").to_string();
        let mut picked = None;
        ui.horizontal(|ui| {
            ui.label("Camera");
            egui::ComboBox::from_id_salt("setup_camera")
                .selected_text(&current)
                .width(260.0)
                .show_ui(ui, |ui| {
                    for camera in &self.setup.cameras {
                        if ui.selectable_label(*camera == current, camera).clicked() {
                            picked = Some(camera.clone());
                        }
                    }
                });
        });
        if let Some(camera) = picked {
            self.setup.select(&camera);
        }
        ui.separator();

        egui::Grid::new("setup_attributes")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .striped(true)
            .show(ui, |ui| {
                for widget in &mut self.setup.widgets {
                    ui.label(widget.attribute().to_string());
                    attribute(ui, widget, dialogs);
                    ui.end_row();
                }
            });
    }
}
