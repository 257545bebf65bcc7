//! egui renderings of the shared display state.

use eframe::egui::{self, Color32, RichText};
use labpanel_core::error::{PanelError, UserError};
use labpanel_core::format::render_value;
use labpanel_core::{AttrValue, AttributeWidget, Control, LabelStyle, Rgb, TextStyle};
use labpanel_panels::common::{Led, StatusText};

use crate::shell::Dialogs;

pub fn color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

fn text_color(style: TextStyle) -> Option<Color32> {
    match style {
        TextStyle::Normal => None,
        TextStyle::Pending => Some(color(Rgb::DARK_GREEN)),
        TextStyle::Stale => Some(Color32::RED),
    }
}

fn write_failed(err: &PanelError) -> UserError {
    UserError::from_error("Failed to write attribute", err)
}

/// Colored label with a background, as used for device states.
pub fn chip(ui: &mut egui::Ui, text: &str, style: LabelStyle) -> egui::Response {
    egui::Frame::new()
        .fill(color(style.background))
        .inner_margin(egui::Margin::symmetric(6, 2))
        .show(ui, |ui| ui.label(RichText::new(text).color(color(style.foreground))))
        .response
}

pub fn status_text(ui: &mut egui::Ui, status: &StatusText) -> egui::Response {
    chip(ui, &status.text, status.style)
}

/// Round status LED; dark when off.
pub fn led(ui: &mut egui::Ui, led: &Led) -> egui::Response {
    let size = 14.0;
    let (rect, response) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::hover());
    let center = rect.center();
    let fill = led.color().map(color).unwrap_or(Color32::from_gray(60));
    ui.painter().circle_filled(center, size / 2.0 - 1.0, fill);
    ui.painter()
        .circle_stroke(center, size / 2.0 - 1.0, egui::Stroke::new(1.0, Color32::BLACK));
    response
}

/// Read-only rendering of a bound attribute.
pub fn readout(ui: &mut egui::Ui, widget: &AttributeWidget) -> egui::Response {
    if widget.is_inert() {
        return inert(ui, widget);
    }
    if let Some(style) = widget.label_style() {
        return chip(ui, &widget.display_text(), style);
    }
    let mut text = RichText::new(widget.display_text()).monospace();
    if let Some(c) = text_color(widget.style()) {
        text = text.color(c);
    }
    ui.label(text)
}

fn inert(ui: &mut egui::Ui, widget: &AttributeWidget) -> egui::Response {
    let reason = widget.inert_reason().unwrap_or("Not connected").to_string();
    ui.add_enabled(false, egui::Label::new("---"))
        .on_disabled_hover_text(reason)
}

/// Editable rendering of a bound attribute, with confirm and reject buttons
/// for controls that stage their edits.
pub fn attribute(ui: &mut egui::Ui, widget: &mut AttributeWidget, dialogs: &mut Dialogs) {
    let Some(control) = widget.control().cloned() else {
        inert(ui, widget);
        return;
    };
    let tint = text_color(widget.style());
    let id = format!("{}/{}", widget.device(), widget.attribute());

    ui.horizontal(|ui| {
        match control {
            Control::TextField { mut text, editable } => {
                if editable {
                    let edit = egui::TextEdit::singleline(&mut text)
                        .desired_width(140.0)
                        .text_color_opt(tint);
                    if ui.add(edit).changed() {
                        widget.edit_text(text);
                    }
                } else {
                    let mut label = RichText::new(text).monospace();
                    if let Some(c) = tint {
                        label = label.color(c);
                    }
                    ui.label(label);
                }
            }
            Control::Checkbox {
                mut checked,
                interactive,
            } => {
                let response = ui.add_enabled(interactive, egui::Checkbox::without_text(&mut checked));
                if response.changed() {
                    if let Err(e) = widget.toggle(checked) {
                        dialogs.push(write_failed(&e));
                    }
                }
            }
            Control::Stepper {
                mut value,
                min,
                max,
                step,
                integer,
                suffix,
            } => {
                let format = widget
                    .descriptor()
                    .map(|d| d.format.clone())
                    .unwrap_or_default();
                let mut drag = egui::DragValue::new(&mut value)
                    .range(min..=max)
                    .speed(step)
                    .suffix(suffix);
                drag = if integer {
                    drag.fixed_decimals(0)
                } else {
                    drag.custom_formatter(move |v, _| render_value(&format, &AttrValue::Float(v)))
                };
                if ui.add(drag).changed() {
                    widget.edit_number(value);
                }
            }
            Control::ComboBox { index, labels } => {
                let shown = index.and_then(|i| labels.get(i)).cloned().unwrap_or_default();
                let mut picked = None;
                egui::ComboBox::from_id_salt(&id)
                    .selected_text(shown)
                    .show_ui(ui, |ui| {
                        for (i, label) in labels.iter().enumerate() {
                            if ui.selectable_label(index == Some(i), label).clicked() {
                                picked = Some(i);
                            }
                        }
                    });
                if let Some(i) = picked {
                    widget.select_index(i);
                }
            }
            Control::StatusLabel { state } => {
                chip(ui, state.name(), state.style());
            }
        }

        if widget.has_confirm_buttons() {
            let enabled = widget.can_confirm();
            if ui.add_enabled(enabled, egui::Button::new("✔")).clicked() {
                if let Err(e) = widget.confirm() {
                    dialogs.push(write_failed(&e));
                }
            }
            if ui.add_enabled(enabled, egui::Button::new("✖")).clicked() {
                if let Err(e) = widget.reject() {
                    dialogs.push(write_failed(&e));
                }
            }
        }
    });
}

/// Single-line text field that reports focus changes and Enter.
pub struct FieldResponse {
    pub gained_focus: bool,
    pub lost_focus: bool,
    /// Enter was pressed while the field had focus.
    pub submitted: bool,
}

pub fn field(ui: &mut egui::Ui, text: &mut String, width: f32) -> FieldResponse {
    let response = ui.add(egui::TextEdit::singleline(text).desired_width(width));
    let lost_focus = response.lost_focus();
    FieldResponse {
        gained_focus: response.gained_focus(),
        lost_focus,
        submitted: lost_focus && ui.input(|i| i.key_pressed(egui::Key::Enter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_and_styles() {
        assert_eq!(color(Rgb::ORANGE), Color32::from_rgb(255, 140, 0));
        assert_eq!(text_color(TextStyle::Normal), None);
        assert_eq!(text_color(TextStyle::Stale), Some(Color32::RED));
        assert_eq!(
            write_failed(&PanelError::ValueConversion("x".into())).title,
            "Value error"
        );
    }
}
