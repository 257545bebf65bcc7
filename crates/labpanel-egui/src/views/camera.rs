//! Laser camera window: two image views, the projection view with its
//! profiles, and the reference review dialog.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::time::Instant;

use eframe::egui::{self, Color32};
use egui_plot::{HLine, Line, Plot, PlotBounds, PlotImage, PlotPoint, PlotPoints, Points, VLine};
use labpanel_core::ChangeEvent;
use labpanel_panels::camera::{Marker, PlotOptions, Profile, View};
use labpanel_panels::review::Coordinate;
use labpanel_panels::{CameraPanel, Panel, ReviewSession};
use ndarray::Array2;

use crate::shell::{Dialogs, PanelView};

const MARKER_COLOR: Color32 = Color32::RED;
const REFERENCE_COLOR: Color32 = Color32::from_rgb(0, 200, 255);
const FIT_COLOR: Color32 = Color32::from_rgb(255, 140, 0);
const ELLIPSE_SEGMENTS: usize = 64;

/// 8-bit grayscale of a frame, scaled to its maximum.
fn grayscale(image: &Array2<f64>) -> egui::ColorImage {
    let (rows, cols) = image.dim();
    let max = image.iter().copied().fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { 255.0 / max } else { 0.0 };
    let pixels: Vec<u8> = image
        .iter()
        .map(|v| (v.max(0.0) * scale).round().min(255.0) as u8)
        .collect();
    egui::ColorImage::from_gray([cols, rows], &pixels)
}

/// Closed outline of an axis-aligned ellipse given by its full widths.
fn ellipse_outline(cx: f64, cy: f64, width: f64, height: f64) -> Vec<[f64; 2]> {
    (0..=ELLIPSE_SEGMENTS)
        .map(|i| {
            let t = TAU * i as f64 / ELLIPSE_SEGMENTS as f64;
            [cx + width / 2.0 * t.cos(), cy + height / 2.0 * t.sin()]
        })
        .collect()
}

fn toggle(ui: &mut egui::Ui, value: &mut bool, text: &str) {
    ui.toggle_value(value, text);
}

pub struct CameraView {
    panel: CameraPanel,
    textures: HashMap<View, egui::TextureHandle>,
    stale: bool,
    review: Option<ReviewSession>,
}

impl CameraView {
    pub fn new(panel: CameraPanel) -> Self {
        Self {
            panel,
            textures: HashMap::new(),
            stale: true,
            review: None,
        }
    }

    fn refresh_textures(&mut self, ctx: &egui::Context) {
        if !self.stale {
            return;
        }
        self.stale = false;
        for view in View::ALL {
            let Some(frame) = self.panel.frame(view) else {
                continue;
            };
            let image = grayscale(&frame.image);
            match self.textures.get_mut(&view) {
                Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
                None => {
                    let name = format!("camera_{}", view.name());
                    let texture = ctx.load_texture(name, image, egui::TextureOptions::NEAREST);
                    self.textures.insert(view, texture);
                }
            }
        }
    }

    fn attribute_picker(&mut self, ui: &mut egui::Ui, view: View) {
        let current = self.panel.selected(view).unwrap_or("").to_string();
        let mut picked = None;
        egui::ComboBox::from_id_salt(("camera_attribute", view.name()))
            .selected_text(&current)
            .show_ui(ui, |ui| {
                for attribute in &self.panel.attributes {
                    if ui.selectable_label(*attribute == current, attribute).clicked() {
                        picked = Some(attribute.clone());
                    }
                }
            });
        if let Some(attribute) = picked.filter(|a| *a != current) {
            self.panel.select(view, &attribute);
            self.stale = true;
        }
    }

    fn image_toolbar(&mut self, ui: &mut egui::Ui, view: View) {
        ui.horizontal(|ui| {
            self.attribute_picker(ui, view);
            // The projection image follows the toggles of its profiles.
            if view == View::Projection {
                return;
            }
            let options: &mut PlotOptions = self.panel.options_mut(view, Profile::Horizontal);
            toggle(ui, &mut options.tracking, "Track");
            toggle(ui, &mut options.swap, "Fit center");
            toggle(ui, &mut options.show_reference, "Reference");
        });
    }

    fn image_plot(&self, ui: &mut egui::Ui, view: View, height: f32) {
        let Some(frame) = self.panel.frame(view) else {
            ui.label("No image");
            return;
        };
        let (rows, cols) = frame.image.dim();
        let (w, h) = (cols as f64, rows as f64);
        let texture = self.textures.get(&view).map(|t| t.id());
        let marker = self.panel.marker(view);
        let reference = self.panel.reference_marker(view, Profile::Horizontal);

        Plot::new(("camera_image", view.name()))
            .data_aspect(1.0)
            .height(height)
            .show_axes([false, false])
            .show_grid(false)
            .show(ui, |plot_ui| {
                if let Some(id) = texture {
                    plot_ui.image(PlotImage::new(
                        "frame",
                        id,
                        PlotPoint::new(w / 2.0, h / 2.0),
                        egui::vec2(w as f32, h as f32),
                    ));
                }
                // Image rows grow downwards, plot y upwards.
                if let Some(Marker { x, y, ellipse }) = marker {
                    plot_ui.points(
                        Points::new("beam", vec![[x, h - y]])
                            .radius(4.0)
                            .color(MARKER_COLOR),
                    );
                    if let Some(e) = ellipse {
                        plot_ui.line(
                            Line::new("fit", PlotPoints::new(ellipse_outline(e.x, h - e.y, e.width, e.height)))
                                .color(MARKER_COLOR),
                        );
                    }
                }
                if let Some(r) = reference {
                    plot_ui.vline(VLine::new("reference", r.x).color(REFERENCE_COLOR));
                    plot_ui.hline(HLine::new("reference", h - r.y).color(REFERENCE_COLOR));
                    if r.h > 0.0 && r.v > 0.0 {
                        let outline = ellipse_outline(r.x, h - r.y, r.h, r.v);
                        plot_ui.line(
                            Line::new("reference", PlotPoints::new(outline)).color(REFERENCE_COLOR),
                        );
                    }
                }
            });
    }

    fn profile_plot(&mut self, ui: &mut egui::Ui, profile: Profile, height: f32) {
        let (name, id) = match profile {
            Profile::Horizontal => ("Horizontal", "camera_profile_h"),
            Profile::Vertical => ("Vertical", "camera_profile_v"),
        };
        ui.horizontal(|ui| {
            ui.label(name);
            let options = self.panel.options_mut(View::Projection, profile);
            toggle(ui, &mut options.tracking, "Track");
            toggle(ui, &mut options.swap, "Fit center");
            toggle(ui, &mut options.show_reference, "Reference");
            toggle(ui, &mut options.autoscale, "Autoscale");
            toggle(ui, &mut options.gauss, "Gauss");
        });

        let Some(data) = self.panel.profile(profile) else {
            ui.label("No image");
            return;
        };
        let points: Vec<[f64; 2]> = data.iter().enumerate().map(|(i, v)| [i as f64, *v]).collect();
        let len = data.len() as f64;
        let fit = self.panel.profile_fit(profile).map(|g| {
            (0..data.len())
                .map(|i| [i as f64, g.eval(i as f64)])
                .collect::<Vec<[f64; 2]>>()
        });
        let marker = self.panel.profile_marker(profile);
        let reference = self
            .panel
            .reference_marker(View::Projection, profile)
            .map(|r| match profile {
                Profile::Horizontal => r.x,
                Profile::Vertical => r.y,
            });
        let range = self.panel.profile_range(profile);

        Plot::new(id).height(height).show(ui, |plot_ui| {
            plot_ui.line(Line::new(name, PlotPoints::new(points)));
            if let Some(fit) = fit {
                plot_ui.line(Line::new("Gauss", PlotPoints::new(fit)).color(FIT_COLOR));
            }
            if let Some(x) = marker {
                plot_ui.vline(VLine::new("beam", x).color(MARKER_COLOR));
            }
            if let Some(x) = reference {
                plot_ui.vline(VLine::new("reference", x).color(REFERENCE_COLOR));
            }
            if let Some((min, max)) = range {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max([0.0, min], [len, max]));
            }
        });
    }

    fn review_window(&mut self, ctx: &egui::Context, dialogs: &mut Dialogs) {
        let Some(mut session) = self.review.take() else {
            return;
        };
        let mut close = false;
        egui::Window::new("Reference review")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    for view in View::ALL {
                        if ui.selectable_label(session.view() == view, view.name()).clicked() && session.view() != view {
                            dialogs.report(session.select_view(&self.panel, view));
                        }
                    }
                });
                ui.label(format!("Attribute: {}", session.attribute().unwrap_or("-")));
                let current = session.reference().unwrap_or_default();
                egui::Grid::new("review_values").num_columns(2).show(ui, |ui| {
                    for (coordinate, label, mut value) in [
                        (Coordinate::X, "X", current.x),
                        (Coordinate::Y, "Y", current.y),
                        (Coordinate::H, "H", current.h),
                        (Coordinate::V, "V", current.v),
                    ] {
                        ui.label(label);
                        let drag = egui::DragValue::new(&mut value).speed(0.5).fixed_decimals(2);
                        if ui.add(drag).changed() {
                            session.set(coordinate, value);
                        }
                        ui.end_row();
                    }
                });
                if session.is_modified() {
                    ui.colored_label(Color32::from_rgb(0, 125, 0), "Modified");
                }
                ui.horizontal(|ui| {
                    if ui.button("From centroid").clicked() {
                        dialogs.report(session.set_from_centroid(&self.panel));
                    }
                    if ui.button("From fit").clicked() {
                        dialogs.report(session.set_from_gauss(&self.panel));
                    }
                });
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        dialogs.report(session.save(&mut self.panel));
                    }
                    if ui.button("Reset").clicked() {
                        session.reset(&self.panel);
                    }
                    if ui.button("Close").clicked() {
                        close = true;
                    }
                });
            });

        if !close {
            self.review = Some(session);
            return;
        }
        if let Err((session, error)) = session.close() {
            dialogs.push(error);
            self.review = Some(session);
        }
    }
}

impl PanelView for CameraView {
    fn title(&self) -> String {
        if self.panel.is_simulation() {
            format!("{} (simulation)", self.panel.title())
        } else {
            format!("{} - {}", self.panel.title(), self.panel.device_name())
        }
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        self.panel.handle_event(event);
        self.stale = true;
    }

    fn tick(&mut self, now: Instant) {
        self.panel.tick(now);
    }

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs) {
        self.refresh_textures(ui.ctx());

        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.review.is_none(), egui::Button::new("Review reference"))
                .clicked()
            {
                self.review = Some(ReviewSession::open(&self.panel, View::Left));
            }
            ui.label(format!("{} image subscriptions", self.panel.subscription_count()));
        });
        ui.separator();

        let height = (ui.available_height() / 2.0 - 40.0).max(120.0);
        ui.columns(2, |columns| {
            for (column, view) in columns.iter_mut().zip([View::Left, View::Right]) {
                column.label(view.name());
                self.image_toolbar(column, view);
                self.image_plot(column, view, height);
            }
        });
        ui.separator();

        ui.columns(3, |columns| {
            columns[0].label(View::Projection.name());
            self.image_toolbar(&mut columns[0], View::Projection);
            self.image_plot(&mut columns[0], View::Projection, height);
            self.profile_plot(&mut columns[1], Profile::Horizontal, height);
            self.profile_plot(&mut columns[2], Profile::Vertical, height);
        });

        self.review_window(ui.ctx(), dialogs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_scales_to_the_brightest_pixel() {
        let image = Array2::from_shape_vec((2, 3), vec![0.0, 50.0, 100.0, -5.0, 25.0, 75.0]).unwrap();
        let gray = grayscale(&image);
        assert_eq!(gray.size, [3, 2]);
        assert_eq!(gray.pixels[2], Color32::from_gray(255));
        assert_eq!(gray.pixels[1], Color32::from_gray(128));
        assert_eq!(gray.pixels[3], Color32::from_gray(0));
    }

    #[test]
    fn ellipse_outline_is_closed() {
        let outline = ellipse_outline(10.0, 20.0, 8.0, 4.0);
        assert_eq!(outline.len(), ELLIPSE_SEGMENTS + 1);
        let (first, last) = (outline[0], outline[ELLIPSE_SEGMENTS]);
        assert!((first[0] - 14.0).abs() < 1e-9 && (first[1] - 20.0).abs() < 1e-9);
        assert!((last[0] - first[0]).abs() < 1e-9 && (last[1] - first[1]).abs() < 1e-9);
    }
}
