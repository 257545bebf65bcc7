use eframe::egui;
use labpanel_panels::PositionerPanel;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::readout;

impl PanelView for PositionerPanel {
    forward_panel!();

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.horizontal(|ui| {
            let current = self.current_device().unwrap_or("").to_string();
            let mut picked = None;
            egui::ComboBox::from_id_salt("positioner_device")
                .selected_text(&current)
                .width(260.0)
                .show_ui(ui, |ui| {
                    for device in &self.devices {
                        if ui.selectable_label(*device == current, device).clicked() {
                            picked = Some(device.clone());
                        }
                    }
                });
            if let Some(device) = picked.filter(|d| *d != current) {
                dialogs.report(self.select_device(&device));
            }
            if ui.button("⟳").on_hover_text("Rescan channels").clicked() {
                self.refresh_devices();
            }
        });
        ui.separator();

        if let Some([calibrated, referenced, state]) = self.status_widgets() {
            egui::Grid::new("positioner_status").num_columns(2).show(ui, |ui| {
                ui.label("Calibrated");
                readout(ui, calibrated);
                ui.end_row();
                ui.label("Referenced");
                readout(ui, referenced);
                ui.end_row();
                ui.label("State");
                readout(ui, state);
                ui.end_row();
            });
        }

        let enabled = self.current_device().is_some();
        ui.add_enabled_ui(enabled, |ui| {
            egui::Grid::new("positioner_motion").num_columns(2).show(ui, |ui| {
                ui.label("Position");
                ui.monospace(format!("{:.3}", self.position));
                ui.end_row();
                ui.label("Set-point");
                let mut target = self.setpoint;
                let drag = egui::DragValue::new(&mut target)
                    .speed(0.1)
                    .fixed_decimals(3)
                    .update_while_editing(false);
                if ui.add(drag).changed() {
                    dialogs.report(self.set_position(target));
                }
                ui.end_row();
            });
            ui.horizontal(|ui| {
                if ui.button("Go").clicked() {
                    let target = self.setpoint;
                    dialogs.report(self.set_position(target));
                }
                if ui.button("Reset").clicked() {
                    self.reset();
                }
                if ui.button("Stop").clicked() {
                    dialogs.report(self.stop());
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Calibrate").clicked() {
                    dialogs.report(self.calibrate());
                }
                if ui.button("Reference").clicked() {
                    dialogs.report(self.reference());
                }
            });
        });
    }
}
