use eframe::egui;
use labpanel_panels::compressor::{CompressorTab, MOVE_STEPS};
use labpanel_panels::CompressorPanel;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::{attribute, status_text};

impl PanelView for CompressorPanel {
    forward_panel!();

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.horizontal(|ui| {
            for (tab, name) in [(CompressorTab::Move, "Move"), (CompressorTab::Temperatures, "Temperatures")] {
                if ui.selectable_label(self.tab() == tab, name).clicked() && self.tab() != tab {
                    dialogs.report(self.select_tab(tab));
                }
            }
        });
        ui.separator();

        match self.tab() {
            CompressorTab::Move => {
                egui::Grid::new("compressor_motor")
                    .num_columns(2)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Position");
                        attribute(ui, &mut self.position, dialogs);
                        ui.end_row();
                        ui.label("Velocity");
                        attribute(ui, &mut self.velocity, dialogs);
                        ui.end_row();
                        ui.label("Acceleration");
                        attribute(ui, &mut self.acceleration, dialogs);
                        ui.end_row();
                        ui.label("Temperature");
                        ui.monospace(&self.temperature);
                        ui.end_row();
                        ui.label("Voltage");
                        ui.monospace(&self.voltage);
                        ui.end_row();
                        ui.label("State");
                        status_text(ui, &self.state);
                        ui.end_row();
                    });
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    for step in MOVE_STEPS.iter().rev() {
                        if ui.button(format!("-{}", step)).clicked() {
                            dialogs.report(self.move_by(-step));
                        }
                    }
                    for step in MOVE_STEPS {
                        if ui.button(format!("+{}", step)).clicked() {
                            dialogs.report(self.move_by(step));
                        }
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("Stop").clicked() {
                        dialogs.report(self.stop());
                    }
                    if ui.button("Home").clicked() {
                        dialogs.report(self.go_home());
                    }
                    if ui.button("Set home").clicked() {
                        dialogs.report(self.set_home());
                    }
                });
            }
            CompressorTab::Temperatures => {
                egui::Grid::new("compressor_monitor")
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for (channel, text) in self.channel_texts() {
                            ui.label(channel);
                            ui.monospace(text);
                            ui.end_row();
                        }
                    });
            }
        }
    }
}
