//! Program browser: the launcher tree with process status.

use std::time::{Duration, Instant};

use eframe::egui;
use labpanel_core::error::UserError;
use labpanel_core::ChangeEvent;
use labpanel_launcher::tree::{status_message, Node, COLUMNS};
use labpanel_launcher::{LauncherTree, Program, ProgramStatus};

use crate::shell::{Dialogs, PanelView};

const NAME_WIDTH: f32 = 220.0;
const PID_WIDTH: f32 = 70.0;

pub struct BrowserView {
    tree: LauncherTree,
    poll_interval: Duration,
    last_poll: Option<Instant>,
    status: String,
}

impl BrowserView {
    pub fn new(tree: LauncherTree, poll_interval: Duration) -> Self {
        Self {
            tree,
            poll_interval,
            last_poll: None,
            status: status_message(0),
        }
    }

    fn refresh(&mut self) {
        self.status = status_message(self.tree.refresh());
    }

    fn activate(&mut self, name: &str, dialogs: &mut Dialogs) {
        if let Err(e) = self.tree.activate(name) {
            dialogs.push(UserError::new(format!("Failed to start {}", name), e.to_string()));
        }
        self.refresh();
    }
}

fn cell(ui: &mut egui::Ui, width: f32, text: impl Into<egui::WidgetText>) -> egui::Response {
    ui.add_sized([width, 18.0], egui::Label::new(text).truncate().sense(egui::Sense::click()))
}

fn program_row(ui: &mut egui::Ui, program: &Program, activated: &mut Option<String>) {
    ui.horizontal(|ui| {
        let name = cell(ui, NAME_WIDTH, program.name.as_str())
            .on_hover_text(program.command().join(" "));
        let pid = program.pid().map(|p| p.to_string()).unwrap_or_default();
        let pid = cell(ui, PID_WIDTH, pid);
        let status = program.status();
        let color = match status {
            ProgramStatus::Running => egui::Color32::from_rgb(0, 125, 0),
            ProgramStatus::NotRunning => ui.visuals().weak_text_color(),
        };
        let status = cell(ui, PID_WIDTH * 1.5, egui::RichText::new(status.to_string()).color(color));
        if name.double_clicked() || pid.double_clicked() || status.double_clicked() {
            *activated = Some(program.name.clone());
        }
    });
}

fn nodes(ui: &mut egui::Ui, nodes: &[Node], activated: &mut Option<String>) {
    for node in nodes {
        match node {
            Node::Category(category) => {
                egui::CollapsingHeader::new(&category.name)
                    .default_open(category.expanded)
                    .show(ui, |ui| self::nodes(ui, &category.children, activated));
            }
            Node::Program(program) => program_row(ui, program, activated),
        }
    }
}

impl PanelView for BrowserView {
    fn title(&self) -> String {
        "Program browser".to_string()
    }

    fn handle_event(&mut self, _event: &ChangeEvent) {}

    fn tick(&mut self, now: Instant) {
        let due = self
            .last_poll
            .map_or(true, |at| now.saturating_duration_since(at) >= self.poll_interval);
        if due {
            self.last_poll = Some(now);
            self.refresh();
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        egui::TopBottomPanel::bottom("browser_status").show_inside(ui, |ui| {
            ui.label(&self.status);
        });

        ui.horizontal(|ui| {
            let [program, pid, status] = COLUMNS;
            ui.add_sized([NAME_WIDTH, 18.0], egui::Label::new(egui::RichText::new(program).strong()));
            ui.add_sized([PID_WIDTH, 18.0], egui::Label::new(egui::RichText::new(pid).strong()));
            ui.add_sized([PID_WIDTH * 1.5, 18.0], egui::Label::new(egui::RichText::new(status).strong()));
        });
        ui.separator();

        let mut activated = None;
        egui::ScrollArea::vertical().show(ui, |ui| nodes(ui, &self.tree.roots, &mut activated));
        if let Some(name) = activated {
            self.activate(&name, dialogs);
        }
    }
}
