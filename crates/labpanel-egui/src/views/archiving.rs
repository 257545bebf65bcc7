//! Archived attribute history window.

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use eframe::egui;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use labpanel_core::error::UserError;
use labpanel_core::ChangeEvent;
use labpanel_panels::archiving::{Span, TimeRange, ARCHIVE_TIME_FORMAT, SPAN_MINUTES};
use labpanel_panels::ArchivingPanel;

use crate::shell::{Dialogs, PanelView};

/// How the range editor is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeMode {
    BeginEnd,
    BeginSpan,
    LastSpan,
}

impl RangeMode {
    const ALL: [RangeMode; 3] = [RangeMode::BeginEnd, RangeMode::BeginSpan, RangeMode::LastSpan];

    fn label(self) -> &'static str {
        match self {
            RangeMode::BeginEnd => "Begin - end",
            RangeMode::BeginSpan => "Begin + span",
            RangeMode::LastSpan => "Last",
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn parse_time(text: &str, what: &str) -> Result<NaiveDateTime, UserError> {
    NaiveDateTime::parse_from_str(text.trim(), ARCHIVE_TIME_FORMAT).map_err(|_| {
        UserError::new(
            "Bad value",
            format!("The {} must be given as YYYY-MM-DD hh:mm:ss", what),
        )
    })
}

/// Tick label of a Unix timestamp in local time.
fn time_label(timestamp: f64, span: f64) -> String {
    let Some(utc) = DateTime::from_timestamp(timestamp.round() as i64, 0) else {
        return String::new();
    };
    let local = utc.with_timezone(&Local);
    if span > TimeDelta::days(1).num_seconds() as f64 {
        local.format("%m-%d %H:%M").to_string()
    } else {
        local.format("%H:%M:%S").to_string()
    }
}

pub struct ArchivingView {
    panel: ArchivingPanel,
    mode: RangeMode,
    begin: String,
    /// Empty means now.
    end: String,
    days: u32,
    hours: u32,
    minutes: u32,
    window: String,
    smoothing: bool,
}

impl ArchivingView {
    pub fn new(panel: ArchivingPanel, smoothing_window: usize) -> Self {
        let (begin, end) = panel.range.resolve(now());
        Self {
            panel,
            mode: RangeMode::BeginEnd,
            begin: begin.format(ARCHIVE_TIME_FORMAT).to_string(),
            end: end.format(ARCHIVE_TIME_FORMAT).to_string(),
            days: 0,
            hours: 1,
            minutes: 0,
            window: smoothing_window.to_string(),
            smoothing: false,
        }
    }

    fn range(&self) -> Result<TimeRange, UserError> {
        let span = || Span::new(self.days, self.hours, self.minutes);
        Ok(match self.mode {
            RangeMode::BeginEnd => TimeRange::BeginEnd {
                begin: parse_time(&self.begin, "begin")?,
                end: match self.end.trim() {
                    "" => None,
                    text => Some(parse_time(text, "end")?),
                },
            },
            RangeMode::BeginSpan => TimeRange::BeginSpan {
                begin: parse_time(&self.begin, "begin")?,
                span: span()?,
            },
            RangeMode::LastSpan => TimeRange::LastSpan(span()?),
        })
    }

    fn refresh(&mut self) -> Result<(), UserError> {
        self.panel.range = self.range()?;
        self.panel.start_refresh(now())
    }

    fn attribute_tree(&mut self, ui: &mut egui::Ui) {
        let tree = self.panel.tree.clone();
        egui::ScrollArea::vertical().show(ui, |ui| {
            for group in &tree {
                let mut all = group.attributes.iter().all(|a| self.panel.is_selected(a));
                egui::CollapsingHeader::new(&group.device)
                    .default_open(false)
                    .show(ui, |ui| {
                        if ui.checkbox(&mut all, "All").changed() {
                            self.panel.set_device_selected(&group.device, all);
                        }
                        for attribute in &group.attributes {
                            let mut selected = self.panel.is_selected(attribute);
                            let name = attribute.rsplit('/').next().unwrap_or(attribute);
                            if ui.checkbox(&mut selected, name).changed() {
                                self.panel.set_selected(attribute, selected);
                            }
                        }
                    });
            }
        });
    }

    fn range_editor(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.horizontal(|ui| {
            for mode in RangeMode::ALL {
                ui.radio_value(&mut self.mode, mode, mode.label());
            }
        });
        egui::Grid::new("archive_range").num_columns(2).show(ui, |ui| {
            if self.mode != RangeMode::LastSpan {
                ui.label("Begin");
                ui.text_edit_singleline(&mut self.begin);
                ui.end_row();
            }
            if self.mode == RangeMode::BeginEnd {
                ui.label("End");
                ui.add(egui::TextEdit::singleline(&mut self.end).hint_text("now"));
                ui.end_row();
            } else {
                ui.label("Span");
                ui.horizontal(|ui| {
                    ui.add(egui::DragValue::new(&mut self.days).range(0..=365).suffix(" d"));
                    ui.add(egui::DragValue::new(&mut self.hours).range(0..=23).suffix(" h"));
                    egui::ComboBox::from_id_salt("archive_minutes")
                        .selected_text(format!("{} min", self.minutes))
                        .show_ui(ui, |ui| {
                            for m in SPAN_MINUTES {
                                ui.selectable_value(&mut self.minutes, m, format!("{} min", m));
                            }
                        });
                });
                ui.end_row();
            }
        });

        ui.horizontal(|ui| {
            let busy = self.panel.is_busy();
            if ui.add_enabled(!busy, egui::Button::new("Refresh")).clicked() {
                dialogs.report(self.refresh());
            }
            if busy {
                ui.spinner();
            }
            if ui.button("Reload attributes").clicked() {
                self.panel.reload_attributes();
            }
        });
        ui.horizontal(|ui| {
            if ui.checkbox(&mut self.smoothing, "Smooth").changed() {
                self.panel.enable_smoothing(self.smoothing);
            }
            let edit = ui.add(egui::TextEdit::singleline(&mut self.window).desired_width(50.0));
            if edit.lost_focus() {
                self.panel.set_window_length(&self.window);
            }
            ui.label("points");
        });
    }

    fn plot(&self, ui: &mut egui::Ui) {
        let lines: Vec<(String, Vec<[f64; 2]>)> = self
            .panel
            .series()
            .iter()
            .enumerate()
            .filter_map(|(i, series)| {
                let values = self.panel.displayed(i)?;
                let points = series
                    .times
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(t, v)| [*t, v])
                    .collect();
                Some((series.attribute.clone(), points))
            })
            .collect();

        Plot::new("archive_plot")
            .legend(Legend::default())
            .x_axis_formatter(|mark, range| time_label(mark.value, range.end() - range.start()))
            .label_formatter(|name, point| {
                format!("{}\n{}\n{:.4}", name, time_label(point.x, 0.0), point.y)
            })
            .show(ui, |plot_ui| {
                for (name, points) in lines {
                    plot_ui.line(Line::new(name, PlotPoints::new(points)));
                }
            });
    }
}

impl PanelView for ArchivingView {
    fn title(&self) -> String {
        "Archiving viewer".to_string()
    }

    fn handle_event(&mut self, _event: &ChangeEvent) {}

    fn tick(&mut self, _now: std::time::Instant) {
        if self.panel.poll() {
            tracing::info!(series = self.panel.series().len(), "Archive data arrived");
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        egui::SidePanel::left("archive_controls")
            .resizable(true)
            .default_width(280.0)
            .show_inside(ui, |ui| {
                self.range_editor(ui, dialogs);
                ui.separator();
                self.attribute_tree(ui);
            });
        self.plot(ui);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_labels_follow_the_span() {
        let stamp = 1_714_644_000.0;
        assert_eq!(time_label(stamp, 3600.0).len(), "12:00:00".len());
        assert_eq!(time_label(stamp, 3.0 * 86_400.0).len(), "05-02 12:00".len());
        assert!(parse_time("2024-05-02 09:00:00", "begin").is_ok());
        assert_eq!(parse_time("yesterday", "begin").unwrap_err().title, "Bad value");
    }
}
