//! Generic attribute widget.
//!
//! An [`AttributeWidget`] binds one device attribute to a UI control chosen
//! from the attribute's metadata:
//!
//! | data type                  | read-only            | read-write                    |
//! |----------------------------|----------------------|-------------------------------|
//! | boolean                    | inert checkbox       | checkbox, writes on toggle    |
//! | numeric, both bounds known | read-only text       | stepper + confirm/reject      |
//! | numeric, a bound missing   | read-only text       | text field + confirm/reject   |
//! | string                     | read-only text       | text field + confirm/reject   |
//! | enum                       | read-only label text | combo box + confirm/reject    |
//! | state                      | colored status label | unsupported                   |
//!
//! Every other combination (read-with-write, write-only, spectrum and image
//! formats, opaque data types) is unsupported and leaves the widget inert.
//!
//! # Edit protocol
//!
//! A user edit marks the widget dirty and paints the text
//! [`TextStyle::Pending`]. While dirty, incoming change events are dropped and
//! only repaint the text [`TextStyle::Stale`]. [`AttributeWidget::confirm`]
//! writes the edited value and clears the dirty flag on success;
//! [`AttributeWidget::reject`] re-reads the device value and clears it.
//!
//! The widget is UI-toolkit independent. A front-end draws [`Control`] and
//! forwards user interaction through the `edit_*`, `toggle`, `confirm` and
//! `reject` methods.

use std::sync::Arc;

use crate::attribute::{AttrValue, AttributeDescriptor, DataFormat, DataType, DevState, LabelStyle, WriteMode};
use crate::bus::{ChangeEvent, DeviceBus, DeviceProxy, SubscriptionId};
use crate::convert::parse_scalar;
use crate::dispatch::EventSink;
use crate::error::{AppResult, BusError, BusErrorKind, PanelError};
use crate::format::{stepper_step, FormatSpec};

/// Control type selected for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    TextField,
    Checkbox,
    Stepper,
    ComboBox,
    StatusLabel,
}

/// Text coloring of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    /// Display matches the device.
    #[default]
    Normal,
    /// The user edited the value (dark green).
    Pending,
    /// The device changed while an edit was pending (red).
    Stale,
}

/// Control state, one variant per [`WidgetKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    TextField {
        text: String,
        editable: bool,
    },
    Checkbox {
        checked: bool,
        interactive: bool,
    },
    Stepper {
        value: f64,
        min: f64,
        max: f64,
        step: f64,
        integer: bool,
        suffix: String,
    },
    ComboBox {
        index: Option<usize>,
        labels: Vec<String>,
    },
    StatusLabel {
        state: DevState,
    },
}

impl Control {
    /// Discriminant of this control.
    pub fn kind(&self) -> WidgetKind {
        match self {
            Control::TextField { .. } => WidgetKind::TextField,
            Control::Checkbox { .. } => WidgetKind::Checkbox,
            Control::Stepper { .. } => WidgetKind::Stepper,
            Control::ComboBox { .. } => WidgetKind::ComboBox,
            Control::StatusLabel { .. } => WidgetKind::StatusLabel,
        }
    }
}

/// Select and build the control for a descriptor.
///
/// Fails with [`PanelError::Unsupported`] for configurations without a
/// control.
pub fn select_control(desc: &AttributeDescriptor) -> AppResult<Control> {
    let unsupported = |what: String| Err(PanelError::Unsupported(what));

    if matches!(desc.data_type, DataType::PipeBlob | DataType::Encoded) {
        return unsupported(format!("Attribute data type {:?} not supported", desc.data_type));
    }
    if desc.data_format != DataFormat::Scalar {
        return unsupported(format!("{:?} attributes are not supported", desc.data_format));
    }

    match desc.write_mode {
        WriteMode::Read => Ok(match desc.data_type {
            DataType::Boolean => Control::Checkbox {
                checked: false,
                interactive: false,
            },
            DataType::State => Control::StatusLabel {
                state: DevState::Unknown,
            },
            _ => Control::TextField {
                text: String::new(),
                editable: false,
            },
        }),
        WriteMode::ReadWrite => match desc.data_type {
            DataType::Boolean => Ok(Control::Checkbox {
                checked: false,
                interactive: true,
            }),
            dt if dt.is_numeric() => match (desc.min, desc.max) {
                (Some(min), Some(max)) => {
                    let integer = dt.is_integer();
                    Ok(Control::Stepper {
                        value: min.max(0.0_f64.min(max)),
                        min,
                        max,
                        step: if integer { 1.0 } else { stepper_step(&desc.format) },
                        integer,
                        suffix: desc.unit.clone(),
                    })
                }
                _ => Ok(Control::TextField {
                    text: String::new(),
                    editable: true,
                }),
            },
            DataType::String => Ok(Control::TextField {
                text: String::new(),
                editable: true,
            }),
            DataType::Enum => Ok(Control::ComboBox {
                index: None,
                labels: desc.enum_labels.clone(),
            }),
            other => unsupported(format!("Unexpected data type '{:?}'", other)),
        },
        mode => unsupported(format!("Write mode {:?} not supported", mode)),
    }
}

/// Control type for a descriptor, `None` when unsupported.
pub fn widget_kind_for(desc: &AttributeDescriptor) -> Option<WidgetKind> {
    select_control(desc).ok().map(|c| c.kind())
}

/// Split `domain/family/member/attribute` into device and attribute names.
pub fn split_attribute_name(full_name: &str) -> Option<(&str, &str)> {
    full_name
        .rsplit_once('/')
        .filter(|(dev, attr)| !dev.is_empty() && !attr.is_empty())
}

/// One device attribute bound to a UI control.
pub struct AttributeWidget {
    device: String,
    attribute: String,
    proxy: Option<Arc<dyn DeviceProxy>>,
    descriptor: Option<AttributeDescriptor>,
    control: Option<Control>,
    subscription: Option<SubscriptionId>,
    dirty: bool,
    style: TextStyle,
    inert_reason: Option<String>,
}

impl AttributeWidget {
    /// Bind to a fully qualified attribute (`domain/family/member/attr`).
    ///
    /// Never fails: connection, metadata or subscription failures produce an
    /// inert widget and are logged.
    pub fn bind(bus: &dyn DeviceBus, full_name: &str, sink: &EventSink) -> Self {
        let Some((device, attribute)) = split_attribute_name(full_name) else {
            tracing::error!(attribute = %full_name, "Malformed attribute name");
            return Self::inert(full_name, "", format!("Malformed attribute name '{}'", full_name));
        };
        tracing::debug!(device, attribute, "Setting up attribute");
        match bus.connect(device).and_then(|proxy| {
            proxy.ping()?;
            Ok(proxy)
        }) {
            Ok(proxy) => Self::bind_proxy(proxy, attribute, sink),
            Err(e) => {
                tracing::error!(device, attribute, error = %e, "Failed to setup attribute");
                Self::inert(device, attribute, e.message)
            }
        }
    }

    /// Bind to `attribute` of an existing proxy.
    pub fn bind_proxy(proxy: Arc<dyn DeviceProxy>, attribute: &str, sink: &EventSink) -> Self {
        let device = proxy.name().to_string();
        let mut widget = Self::inert(&device, attribute, "not initialised");

        let setup = proxy
            .attribute_config(attribute)
            .map_err(PanelError::from)
            .and_then(|desc| select_control(&desc).map(|control| (desc, control)));
        let (descriptor, control) = match setup {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(device = %device, attribute, error = %e, "Failed to setup attribute");
                widget.inert_reason = Some(e.to_string());
                return widget;
            }
        };

        match proxy.subscribe(attribute, sink.callback()) {
            Ok(id) => {
                widget.subscription = Some(id);
                widget.descriptor = Some(descriptor);
                widget.control = Some(control);
                widget.proxy = Some(proxy);
                widget.inert_reason = None;
            }
            Err(e) => {
                tracing::error!(device = %device, attribute, error = %e, "Failed to subscribe attribute");
                widget.inert_reason = Some(e.message);
            }
        }
        widget
    }

    fn inert(device: &str, attribute: &str, reason: impl Into<String>) -> Self {
        Self {
            device: device.to_string(),
            attribute: attribute.to_string(),
            proxy: None,
            descriptor: None,
            control: None,
            subscription: None,
            dirty: false,
            style: TextStyle::Normal,
            inert_reason: Some(reason.into()),
        }
    }

    // ===== Accessors =====

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn descriptor(&self) -> Option<&AttributeDescriptor> {
        self.descriptor.as_ref()
    }

    /// Current control, `None` when inert.
    pub fn control(&self) -> Option<&Control> {
        self.control.as_ref()
    }

    pub fn kind(&self) -> Option<WidgetKind> {
        self.control.as_ref().map(Control::kind)
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Confirm and reject buttons are enabled.
    pub fn can_confirm(&self) -> bool {
        self.dirty
    }

    /// The control offers confirm/reject buttons at all.
    pub fn has_confirm_buttons(&self) -> bool {
        matches!(
            self.control,
            Some(Control::TextField { editable: true, .. })
                | Some(Control::Stepper { .. })
                | Some(Control::ComboBox { .. })
        )
    }

    pub fn style(&self) -> TextStyle {
        self.style
    }

    pub fn is_inert(&self) -> bool {
        self.control.is_none()
    }

    /// Why the widget is inert.
    pub fn inert_reason(&self) -> Option<&str> {
        self.inert_reason.as_deref()
    }

    /// Background and text color of a status label.
    pub fn label_style(&self) -> Option<LabelStyle> {
        match &self.control {
            Some(Control::StatusLabel { state }) => Some(state.style()),
            _ => None,
        }
    }

    /// The event belongs to this widget's subscription.
    pub fn owns(&self, event: &ChangeEvent) -> bool {
        self.subscription == Some(event.subscription)
    }

    /// Text the control currently shows.
    pub fn display_text(&self) -> String {
        match &self.control {
            None => String::new(),
            Some(Control::TextField { text, .. }) => text.clone(),
            Some(Control::Checkbox { checked, .. }) => {
                if *checked { "True" } else { "False" }.to_string()
            }
            Some(Control::Stepper { value, integer, .. }) => {
                if *integer {
                    format!("{}", value.round() as i64)
                } else {
                    let format = self.descriptor.as_ref().map(|d| d.format.as_str()).unwrap_or("");
                    FormatSpec::parse(format).render(&AttrValue::Float(*value))
                }
            }
            Some(Control::ComboBox { index, labels }) => index
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_default(),
            Some(Control::StatusLabel { state }) => state.name().to_string(),
        }
    }

    fn is_read_write(&self) -> bool {
        self.descriptor
            .as_ref()
            .is_some_and(|d| d.write_mode == WriteMode::ReadWrite)
    }

    // ===== Incoming events =====

    /// Apply a change event. Returns `true` when the displayed value changed.
    pub fn handle_event(&mut self, event: &ChangeEvent) -> bool {
        if self.control.is_none() {
            return false;
        }
        if let Some(err) = &event.error {
            tracing::error!(
                device = %self.device,
                attribute = %self.attribute,
                reason = %err.reason,
                "{}",
                err.description
            );
            return false;
        }
        if !event.is_for(&self.attribute) {
            tracing::error!(
                expected = %self.attribute,
                got = %event.attribute,
                "Attribute name does not match"
            );
            return false;
        }
        let Some(value) = &event.value else {
            return false;
        };

        if self.is_read_write() && self.dirty {
            self.style = TextStyle::Stale;
            return false;
        }
        let before = self.control.clone();
        self.show_value(value);
        before != self.control
    }

    fn show_value(&mut self, value: &AttrValue) {
        let Some(desc) = self.descriptor.as_ref() else {
            return;
        };
        let rendered = if desc.data_type.is_numeric() {
            FormatSpec::parse(&desc.format).render(value)
        } else if desc.data_type == DataType::Enum {
            value
                .as_i64()
                .and_then(|i| desc.enum_label(i))
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string())
        } else {
            value.to_string()
        };

        match self.control.as_mut() {
            Some(Control::TextField { text, .. }) => *text = rendered,
            Some(Control::Checkbox { checked, .. }) => {
                if let Some(b) = value.as_bool() {
                    *checked = b;
                }
            }
            Some(Control::Stepper {
                value: current,
                min,
                max,
                ..
            }) => {
                if let Some(v) = value.as_f64() {
                    *current = v.clamp(*min, *max);
                }
            }
            Some(Control::ComboBox { index, labels }) => {
                *index = value
                    .as_i64()
                    .and_then(|i| usize::try_from(i).ok())
                    .filter(|i| *i < labels.len());
            }
            Some(Control::StatusLabel { state }) => {
                if let Some(s) = value.as_state() {
                    *state = s;
                }
            }
            None => {}
        }
    }

    // ===== User edits =====

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.style = TextStyle::Pending;
    }

    /// The user typed into an editable text field.
    pub fn edit_text(&mut self, new_text: impl Into<String>) {
        if let Some(Control::TextField {
            text,
            editable: true,
        }) = self.control.as_mut()
        {
            *text = new_text.into();
            self.mark_dirty();
        }
    }

    /// The user changed the stepper value.
    pub fn edit_number(&mut self, new_value: f64) {
        if let Some(Control::Stepper {
            value,
            min,
            max,
            integer,
            ..
        }) = self.control.as_mut()
        {
            let v = if *integer { new_value.round() } else { new_value };
            *value = v.clamp(*min, *max);
            self.mark_dirty();
        }
    }

    /// The user picked a combo box entry.
    pub fn select_index(&mut self, new_index: usize) {
        if let Some(Control::ComboBox { index, labels }) = self.control.as_mut() {
            if new_index < labels.len() {
                *index = Some(new_index);
                self.mark_dirty();
            }
        }
    }

    /// The user toggled a writable checkbox. The value is written at once.
    ///
    /// On failure the checkbox returns to its previous state.
    pub fn toggle(&mut self, checked: bool) -> AppResult<()> {
        let proxy = self.proxy.clone();
        let Some(Control::Checkbox {
            checked: current,
            interactive: true,
        }) = self.control.as_mut()
        else {
            return Err(PanelError::InvalidState(format!(
                "Attribute '{}' is not a writable checkbox",
                self.attribute
            )));
        };
        let previous = *current;
        *current = checked;
        let result = match proxy {
            Some(proxy) => proxy
                .write_attribute(&self.attribute, AttrValue::Bool(checked))
                .map_err(PanelError::from),
            None => Err(self.disconnected()),
        };
        if result.is_err() {
            if let Some(Control::Checkbox { checked: current, .. }) = self.control.as_mut() {
                *current = previous;
            }
        }
        result
    }

    fn disconnected(&self) -> PanelError {
        BusError::new(&self.device, BusErrorKind::Connection, "Device not connected").into()
    }

    /// Value that confirm would write.
    fn pending_value(&self) -> AppResult<AttrValue> {
        let desc = self
            .descriptor
            .as_ref()
            .ok_or_else(|| PanelError::InvalidState("widget is inert".into()))?;
        match &self.control {
            Some(Control::TextField {
                text,
                editable: true,
            }) => parse_scalar(text, desc.data_type).map_err(|e| match e {
                PanelError::Unsupported(_) => e,
                other => PanelError::ValueConversion(other.to_string()),
            }),
            Some(Control::Stepper { value, integer, .. }) => Ok(if *integer {
                AttrValue::Int(value.round() as i64)
            } else {
                AttrValue::Float(*value)
            }),
            Some(Control::ComboBox { index, .. }) => index
                .map(|i| AttrValue::Enum(i as i64))
                .ok_or_else(|| PanelError::ValueConversion("no entry selected".into())),
            _ => Err(PanelError::InvalidState(format!(
                "Attribute '{}' has no confirmable edit",
                self.attribute
            ))),
        }
    }

    /// Write the edited value to the device.
    ///
    /// On success the dirty flag is cleared. On failure the edit and the
    /// dirty flag are kept.
    pub fn confirm(&mut self) -> AppResult<()> {
        let value = self.pending_value()?;
        let proxy = self.proxy.clone().ok_or_else(|| self.disconnected())?;
        proxy.write_attribute(&self.attribute, value)?;
        tracing::debug!(device = %self.device, attribute = %self.attribute, "Attribute written");
        self.dirty = false;
        self.style = TextStyle::Normal;
        Ok(())
    }

    /// Discard the edit and show the device value again.
    pub fn reject(&mut self) -> AppResult<()> {
        let proxy = self.proxy.clone().ok_or_else(|| self.disconnected())?;
        let value = proxy.read_attribute(&self.attribute)?;
        self.show_value(&value);
        self.dirty = false;
        self.style = TextStyle::Normal;
        Ok(())
    }

    /// Drop the event subscription. Called on teardown or device swap.
    pub fn shutdown(&mut self) {
        if let (Some(proxy), Some(id)) = (self.proxy.as_ref(), self.subscription.take()) {
            if let Err(e) = proxy.unsubscribe(id) {
                tracing::warn!(device = %self.device, attribute = %self.attribute, error = %e, "Error unsubscribing");
            }
        }
    }
}

impl Drop for AttributeWidget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AttributeWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeWidget")
            .field("device", &self.device)
            .field("attribute", &self.attribute)
            .field("control", &self.control)
            .field("dirty", &self.dirty)
            .field("style", &self.style)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(dt: DataType, mode: WriteMode) -> AttributeDescriptor {
        AttributeDescriptor::new("Value", dt).with_write_mode(mode)
    }

    #[test]
    fn exhaustive_mapping_table() {
        for dt in DataType::ALL {
            for mode in WriteMode::ALL {
                let unbounded = widget_kind_for(&desc(dt, mode));
                let bounded = widget_kind_for(&desc(dt, mode).with_range(0.0, 10.0));

                let (expect_unbounded, expect_bounded) = match (dt, mode) {
                    (DataType::PipeBlob | DataType::Encoded, _) => (None, None),
                    (_, WriteMode::ReadWithWrite | WriteMode::Write) => (None, None),
                    (DataType::Boolean, _) => {
                        (Some(WidgetKind::Checkbox), Some(WidgetKind::Checkbox))
                    }
                    (DataType::State, WriteMode::Read) => {
                        (Some(WidgetKind::StatusLabel), Some(WidgetKind::StatusLabel))
                    }
                    (DataType::State, _) => (None, None),
                    (_, WriteMode::Read) => {
                        (Some(WidgetKind::TextField), Some(WidgetKind::TextField))
                    }
                    (DataType::Enum, _) => {
                        (Some(WidgetKind::ComboBox), Some(WidgetKind::ComboBox))
                    }
                    (DataType::String, _) => {
                        (Some(WidgetKind::TextField), Some(WidgetKind::TextField))
                    }
                    (dt, _) if dt.is_numeric() => {
                        (Some(WidgetKind::TextField), Some(WidgetKind::Stepper))
                    }
                    _ => unreachable!(),
                };
                assert_eq!(unbounded, expect_unbounded, "{:?}/{:?}", dt, mode);
                assert_eq!(bounded, expect_bounded, "{:?}/{:?} bounded", dt, mode);
            }
        }
    }

    #[test]
    fn non_scalar_formats_are_unsupported() {
        for format in [DataFormat::Spectrum, DataFormat::Image] {
            let d = desc(DataType::Double, WriteMode::Read).with_data_format(format);
            assert_eq!(widget_kind_for(&d), None);
        }
    }

    #[test]
    fn stepper_parameters() {
        let d = desc(DataType::Double, WriteMode::ReadWrite)
            .with_range(-5.0, 5.0)
            .with_format("%7.3f")
            .with_unit(" mm");
        match select_control(&d).unwrap() {
            Control::Stepper {
                step,
                integer,
                suffix,
                value,
                ..
            } => {
                assert!((step - 0.001).abs() < 1e-12);
                assert!(!integer);
                assert_eq!(suffix, " mm");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected control {:?}", other),
        }

        let d = desc(DataType::UShort, WriteMode::ReadWrite).with_range(10.0, 20.0);
        match select_control(&d).unwrap() {
            Control::Stepper { step, integer, value, .. } => {
                assert_eq!(step, 1.0);
                assert!(integer);
                assert_eq!(value, 10.0);
            }
            other => panic!("unexpected control {:?}", other),
        }
    }

    #[test]
    fn attribute_name_split() {
        assert_eq!(
            split_attribute_name("udyni/laser/compressor/Position"),
            Some(("udyni/laser/compressor", "Position"))
        );
        assert_eq!(split_attribute_name("Position"), None);
        assert_eq!(split_attribute_name("a/b/c/"), None);
    }
}
