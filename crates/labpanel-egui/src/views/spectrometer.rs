//! Spectrum viewer window.

use std::path::PathBuf;
use std::time::Instant;

use eframe::egui::{self, Color32};
use egui_plot::{Legend, Line, Plot, PlotPoints, VLine};
use labpanel_core::ChangeEvent;
use labpanel_panels::spectrometer::EditField;
use labpanel_panels::{Panel, SpectrometerPanel};
use labpanel_storage::ExportFormat;

use crate::shell::{Dialogs, PanelView};
use crate::widgets::{field, status_text, FieldResponse};

const OVERLAY_COLOR: Color32 = Color32::from_gray(150);
const MARKER_COLOR: Color32 = Color32::from_rgb(255, 140, 0);

pub struct SpectrometerView {
    panel: SpectrometerPanel,
    format: ExportFormat,
    last_dir: Option<PathBuf>,
}

impl SpectrometerView {
    pub fn new(panel: SpectrometerPanel) -> Self {
        Self {
            panel,
            format: ExportFormat::Csv,
            last_dir: None,
        }
    }

    fn follow_focus(&mut self, edited: EditField, response: &FieldResponse) {
        if response.gained_focus {
            self.panel.set_focus(Some(edited));
        }
        if response.lost_focus {
            self.panel.set_focus(None);
        }
    }

    fn device_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let current = self.panel.current_device().unwrap_or("").to_string();
            let mut picked = None;
            egui::ComboBox::from_id_salt("spectrometer_device")
                .selected_text(&current)
                .width(220.0)
                .show_ui(ui, |ui| {
                    for device in &self.panel.devices {
                        if ui.selectable_label(*device == current, device).clicked() {
                            picked = Some(device.clone());
                        }
                    }
                });
            if let Some(device) = picked.filter(|d| *d != current) {
                self.panel.select(&device);
            }
            if ui.button("Rescan").clicked() {
                self.panel.rescan();
            }
            ui.label(format!("{} ({})", self.panel.model, self.panel.serial));
            status_text(ui, &self.panel.status);
        });
    }

    fn settings(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        egui::Grid::new("spectrometer_settings")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label("Integration time");
                let r = field(ui, &mut self.panel.integration_time, 90.0);
                self.follow_focus(EditField::IntegrationTime, &r);
                if r.submitted {
                    let text = self.panel.integration_time.clone();
                    dialogs.report(self.panel.set_integration_time(&text));
                }
                ui.end_row();

                ui.label("Scans to average");
                let r = field(ui, &mut self.panel.scans_to_average, 90.0);
                self.follow_focus(EditField::ScansToAverage, &r);
                if r.submitted {
                    let text = self.panel.scans_to_average.clone();
                    dialogs.report(self.panel.set_scans_to_average(&text));
                }
                ui.end_row();

                ui.label("Boxcar width");
                let r = field(ui, &mut self.panel.boxcar_width, 90.0);
                self.follow_focus(EditField::BoxcarWidth, &r);
                if r.submitted {
                    let text = self.panel.boxcar_width.clone();
                    dialogs.report(self.panel.set_boxcar_width(&text));
                }
                ui.end_row();

                if self.panel.has_tec() {
                    ui.label("TEC set-point");
                    let r = field(ui, &mut self.panel.tec_setpoint, 90.0);
                    self.follow_focus(EditField::TecSetPoint, &r);
                    if r.submitted {
                        let text = self.panel.tec_setpoint.clone();
                        dialogs.report(self.panel.set_tec_setpoint(&text));
                    }
                    ui.end_row();
                }
                ui.label("TEC temperature");
                ui.monospace(&self.panel.tec_temperature);
                ui.end_row();
            });

        ui.horizontal_wrapped(|ui| {
            let mut flag = self.panel.background_subtraction;
            if ui.checkbox(&mut flag, "Subtract background").changed() {
                dialogs.report(self.panel.set_background_subtraction(flag));
            }
            let mut flag = self.panel.dark_correction;
            if ui.checkbox(&mut flag, "Dark correction").changed() {
                dialogs.report(self.panel.set_dark_correction(flag));
            }
            let mut flag = self.panel.nl_correction;
            if ui.checkbox(&mut flag, "NL correction").changed() {
                dialogs.report(self.panel.set_nl_correction(flag));
            }
            let mut flag = self.panel.tec_enabled;
            let tec = ui.add_enabled(self.panel.has_tec(), egui::Checkbox::new(&mut flag, "TEC"));
            if tec.changed() {
                dialogs.report(self.panel.set_tec(flag));
            }
        });

        ui.horizontal_wrapped(|ui| {
            if ui.button("Store background").clicked() {
                dialogs.report(self.panel.store_background());
            }
            if ui.button("Add overlay").clicked() {
                self.panel.add_overlay();
            }
            if ui.button("Clear overlays").clicked() {
                self.panel.clear_overlays();
            }
            let mut delta = self.panel.markers.delta;
            if ui.checkbox(&mut delta, "Delta cursor").changed() {
                self.panel.markers.set_delta(delta);
            }
            ui.monospace(self.panel.markers.text());
            ui.separator();
            ui.label(format!("FWHM: {} nm", self.panel.bandwidth));
        });
    }

    fn export_bar(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("spectrometer_format")
                .selected_text(self.format.label())
                .show_ui(ui, |ui| {
                    for format in ExportFormat::ALL {
                        ui.selectable_value(&mut self.format, format, format.label());
                    }
                });
            if ui.button("Export…").clicked() {
                self.export(dialogs);
            }
        });
    }

    fn export(&mut self, dialogs: &mut Dialogs) {
        let mut dialog = rfd::FileDialog::new().set_title("Export spectrum");
        if let Some(ext) = self.format.extension() {
            dialog = dialog.add_filter(self.format.label(), &[ext]);
        }
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };
        self.last_dir = path.parent().map(PathBuf::from);
        match self.panel.export(self.format, &path) {
            Ok(Some(written)) => tracing::info!(path = %written.display(), "Spectrum saved"),
            Ok(None) => tracing::info!("Nothing to export"),
            Err(e) => dialogs.push(e),
        }
    }

    fn plot(&mut self, ui: &mut egui::Ui) {
        let points = |values: &[f64]| -> Vec<[f64; 2]> {
            self.panel
                .wavelength
                .iter()
                .zip(values)
                .map(|(x, y)| [*x, *y])
                .collect()
        };
        let overlays: Vec<Vec<[f64; 2]>> = self.panel.overlays.iter().map(|o| points(o)).collect();
        let spectrum = points(&self.panel.spectrum);
        let (low, high) = self.panel.fwhm;
        let markers = [self.panel.markers.first, self.panel.markers.second];

        let response = Plot::new("spectrum")
            .legend(Legend::default())
            .x_axis_label("Wavelength (nm)")
            .y_axis_label("Counts")
            .show(ui, |plot_ui| {
                for (i, overlay) in overlays.into_iter().enumerate() {
                    plot_ui.line(
                        Line::new(format!("Overlay {}", i + 1), PlotPoints::new(overlay))
                            .color(OVERLAY_COLOR),
                    );
                }
                plot_ui.line(Line::new("Spectrum", PlotPoints::new(spectrum)));
                if low.is_finite() && high.is_finite() {
                    plot_ui.vline(VLine::new("FWHM", low).color(Color32::LIGHT_BLUE));
                    plot_ui.vline(VLine::new("FWHM", high).color(Color32::LIGHT_BLUE));
                }
                for x in markers.into_iter().flatten() {
                    plot_ui.vline(VLine::new("Cursor", x).color(MARKER_COLOR));
                }
            });

        if response.response.clicked() {
            if let Some(pos) = response.response.interact_pointer_pos() {
                let value = response.transform.value_from_position(pos);
                self.panel.markers.click(value.x);
            }
        }
    }
}

impl PanelView for SpectrometerView {
    fn title(&self) -> String {
        self.panel.title().to_string()
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        self.panel.handle_event(event);
    }

    fn tick(&mut self, now: Instant) {
        self.panel.tick(now);
    }

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        self.device_bar(ui);
        ui.separator();
        egui::SidePanel::right("spectrometer_controls")
            .resizable(false)
            .show_inside(ui, |ui| {
                self.settings(ui, dialogs);
                ui.separator();
                self.export_bar(ui, dialogs);
            });
        self.plot(ui);
    }
}
