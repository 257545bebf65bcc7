use eframe::egui;
use labpanel_panels::CryostatPanel;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::led;

impl PanelView for CryostatPanel {
    forward_panel!();

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        egui::Grid::new("cryostat_readings")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.label("Pressure");
                ui.monospace(&self.pressure);
                ui.end_row();
                ui.label("Temperature");
                ui.monospace(format!("{} °C", self.temperature));
                ui.end_row();
                ui.label("Delta T");
                ui.monospace(format!("{} °C", self.delta));
                ui.end_row();
            });
        ui.separator();

        egui::Grid::new("cryostat_status")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                for (name, status) in [
                    ("Pump", &self.pump_status),
                    ("Vacuum", &self.vacuum_status),
                    ("Compressor", &self.compressor_status),
                    ("Temperature", &self.temperature_status),
                ] {
                    led(ui, status);
                    ui.label(name);
                    ui.end_row();
                }
                led(ui, &self.water_status);
                ui.label(format!("Cooling water ({})", self.water_valve()));
                ui.end_row();
            });
        ui.separator();

        ui.horizontal(|ui| {
            if ui.add_enabled(self.start_enabled, egui::Button::new("Start")).clicked() {
                dialogs.report(self.start_compressor());
            }
            if ui.add_enabled(!self.start_enabled, egui::Button::new("Stop")).clicked() {
                dialogs.report(self.stop_compressor());
            }
        });

        if !self.offline_devices().is_empty() {
            ui.colored_label(
                egui::Color32::RED,
                format!("Offline: {}", self.offline_devices().join(", ")),
            );
        }
    }
}
