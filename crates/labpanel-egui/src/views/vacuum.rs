use eframe::egui;
use labpanel_panels::VacuumPanel;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::{field, status_text};

impl PanelView for VacuumPanel {
    forward_panel!();

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        egui::Grid::new("vacuum_readings")
            .num_columns(3)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                for (name, value, unit) in [
                    ("Frequency", &self.frequency, "Hz"),
                    ("Current", &self.current, "A"),
                    ("Voltage", &self.voltage, "V"),
                    ("Power", &self.power, "W"),
                    ("Temperature", &self.temperature, "°C"),
                    ("Pressure", &self.pressure, "mbar"),
                ] {
                    ui.label(name);
                    ui.monospace(value.as_str());
                    ui.label(unit);
                    ui.end_row();
                }
            });
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Set-point");
            let response = field(ui, &mut self.setpoint, 80.0);
            if response.gained_focus {
                self.set_setpoint_focus(true);
            }
            if response.lost_focus {
                self.set_setpoint_focus(false);
                if response.submitted {
                    let text = self.setpoint.clone();
                    dialogs.report(self.commit_setpoint(&text));
                }
            }
            ui.label("Hz");
        });

        ui.horizontal(|ui| {
            let mut purge = self.purge;
            if ui.checkbox(&mut purge, "Purge").changed() {
                dialogs.report(self.set_purge(purge));
            }
            let mut ballast = self.ballast;
            if ui.checkbox(&mut ballast, "Gas ballast").changed() {
                dialogs.report(self.set_ballast(ballast));
            }
            let mut air = self.compressed_air;
            ui.add_enabled(false, egui::Checkbox::new(&mut air, "Compressed air"));
        });

        egui::Grid::new("vacuum_status").num_columns(2).show(ui, |ui| {
            ui.label("Water valve");
            status_text(ui, &self.water_valve);
            ui.end_row();
            ui.label("State");
            status_text(ui, &self.state);
            ui.end_row();
        });

        ui.horizontal(|ui| {
            if ui.button("Start").clicked() {
                dialogs.report(self.start());
            }
            if ui.button("Stop").clicked() {
                dialogs.report(self.stop());
            }
            if ui.button("Reset").clicked() {
                dialogs.report(self.reset());
            }
        });
    }
}
