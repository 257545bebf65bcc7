use eframe::egui;
use labpanel_core::ChangeEvent;
use labpanel_panels::CommandExecuter;

use crate::shell::{Dialogs, PanelView};

pub struct ExecuterView {
    console: CommandExecuter,
    device: String,
    argument: String,
}

impl ExecuterView {
    pub fn new(console: CommandExecuter, device: Option<&str>) -> Self {
        let mut view = Self {
            console,
            device: device.unwrap_or_default().to_string(),
            argument: String::new(),
        };
        if !view.device.is_empty() {
            let device = view.device.clone();
            view.console.set_device(&device);
        }
        view
    }
}

impl PanelView for ExecuterView {
    fn title(&self) -> String {
        "Command executer".to_string()
    }

    fn handle_event(&mut self, _event: &ChangeEvent) {}

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.horizontal(|ui| {
            ui.label("Device");
            let edit = ui.add(egui::TextEdit::singleline(&mut self.device).desired_width(280.0));
            let entered = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if entered || ui.button("Connect").clicked() {
                let device = self.device.trim().to_string();
                self.console.set_device(&device);
            }
        });

        let current = self.console.selected_command().unwrap_or("").to_string();
        let mut picked = None;
        ui.add_enabled_ui(self.console.device().is_some(), |ui| {
            ui.horizontal(|ui| {
                ui.label("Command");
                egui::ComboBox::from_id_salt("executer_command")
                    .selected_text(&current)
                    .width(220.0)
                    .show_ui(ui, |ui| {
                        for command in &self.console.commands {
                            if ui.selectable_label(*command == current, command).clicked() {
                                picked = Some(command.clone());
                            }
                        }
                    });
            });
        });
        if let Some(command) = picked {
            self.console.select_command(&command);
        }
        ui.label(&self.console.description);
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Argument");
            ui.add_enabled(
                self.console.argument_enabled(),
                egui::TextEdit::singleline(&mut self.argument).desired_width(220.0),
            );
            if ui
                .add_enabled(self.console.is_enabled(), egui::Button::new("Execute"))
                .clicked()
            {
                let argument = if self.console.argument_enabled() {
                    self.argument.clone()
                } else {
                    String::new()
                };
                dialogs.report(self.console.execute(&argument));
            }
        });

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.console.result.as_str())
                    .font(egui::TextStyle::Monospace)
                    .desired_width(f32::INFINITY),
            );
        });
    }
}
