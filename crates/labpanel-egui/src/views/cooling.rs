use eframe::egui;
use labpanel_panels::cooling::{Valve, ValveButton};
use labpanel_panels::CoolingPanel;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::readout;

fn valve_button(ui: &mut egui::Ui, name: &str, button: &ValveButton) -> bool {
    ui.horizontal(|ui| {
        ui.label(name);
        ui.add_enabled(button.enabled, egui::Button::new(button.text))
            .clicked()
    })
    .inner
}

impl PanelView for CoolingPanel {
    forward_panel!();

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.heading("Valves");
        egui::Grid::new("cooling_valves")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for (label, widget) in &self.valves {
                    ui.label(label);
                    readout(ui, widget);
                    ui.end_row();
                }
            });
        ui.add_space(6.0);
        if valve_button(ui, "XUV line", &self.xuv_button) {
            dialogs.report(self.toggle(Valve::Xuv));
        }
        if valve_button(ui, "VMI line", &self.vmi_button) {
            dialogs.report(self.toggle(Valve::Vmi));
        }
        ui.separator();

        ui.heading("Chiller");
        egui::Grid::new("cooling_chiller")
            .num_columns(2)
            .show(ui, |ui| {
                for widget in &self.chiller {
                    ui.label(widget.attribute());
                    readout(ui, widget);
                    ui.end_row();
                }
            });
    }
}
