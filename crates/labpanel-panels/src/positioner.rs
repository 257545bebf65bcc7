//! SmarAct positioner panel.
//!
//! Lists the positioner channels that may be driven directly, and drives the
//! selected one through a set-point dial.

use std::sync::Arc;

use labpanel_core::attribute::AttrValue;
use labpanel_core::bus::{connect_checked, property_flag, ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::{BusError, UserError};
use labpanel_core::widget::AttributeWidget;

use crate::common::{bus_failure, Panel, Subscriptions};

/// Device class of the positioner channels.
pub const POSITIONER_CLASS: &str = "SmarActPositioner";

/// Channels that answer a ping and do not forbid direct control.
pub fn discover(bus: &dyn DeviceBus) -> Result<Vec<String>, BusError> {
    let mut devices = Vec::new();
    for device in bus.exported_devices(POSITIONER_CLASS)? {
        let reachable = bus
            .device_property(&device, "no_direct_control")
            .map(|v| !property_flag(&v))
            .and_then(|allowed| {
                if allowed {
                    connect_checked(bus, &device).map(|_| true)
                } else {
                    Ok(false)
                }
            });
        match reachable {
            Ok(true) => devices.push(device),
            Ok(false) => tracing::debug!(device = %device, "Direct control forbidden"),
            Err(e) => tracing::warn!(device = %device, error = %e, "Device is not reachable"),
        }
    }
    Ok(devices)
}

struct Selected {
    proxy: Arc<dyn DeviceProxy>,
    is_calibrated: AttributeWidget,
    is_referenced: AttributeWidget,
    state: AttributeWidget,
}

/// Positioner panel controller.
pub struct PositionerPanel {
    bus: Arc<dyn DeviceBus>,
    sink: EventSink,
    /// Selectable channels.
    pub devices: Vec<String>,
    selected: Option<Selected>,
    /// Last position reported by the device.
    pub position: f64,
    /// Set-point shown on the dial.
    pub setpoint: f64,
    subscriptions: Subscriptions,
}

impl PositionerPanel {
    /// Build the panel and select the first available channel.
    pub fn open(bus: Arc<dyn DeviceBus>, sink: EventSink) -> Result<Self, UserError> {
        let mut panel = Self {
            bus,
            sink,
            devices: Vec::new(),
            selected: None,
            position: 0.0,
            setpoint: 0.0,
            subscriptions: Subscriptions::new(),
        };
        panel.refresh_devices();
        if let Some(first) = panel.devices.first().cloned() {
            panel.select_device(&first)?;
        }
        Ok(panel)
    }

    /// Rebuild the channel list.
    pub fn refresh_devices(&mut self) {
        self.devices = discover(self.bus.as_ref()).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to list positioners");
            Vec::new()
        });
    }

    /// Name of the selected channel.
    pub fn current_device(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.proxy.name())
    }

    /// Calibration, referencing and state widgets of the selected channel.
    pub fn status_widgets(&self) -> Option<[&AttributeWidget; 3]> {
        self.selected
            .as_ref()
            .map(|s| [&s.is_calibrated, &s.is_referenced, &s.state])
    }

    /// Switch to another channel, dropping the events of the previous one.
    pub fn select_device(&mut self, device: &str) -> Result<(), UserError> {
        tracing::info!(device, "Current device");
        if let Some(previous) = self.selected.take() {
            self.subscriptions.release_device(previous.proxy.name());
        }
        let proxy = self
            .bus
            .connect(device)
            .map_err(|e| bus_failure("Failed to select device", &e))?;
        self.subscriptions
            .subscribe(&proxy, "Position", &self.sink)
            .map_err(|e| bus_failure("Failed to select device", &e))?;
        match proxy.read_attribute("Position") {
            Ok(value) => self.position = value.as_f64().unwrap_or(self.position),
            Err(e) => tracing::warn!(device, error = %e, "Failed to read position"),
        }
        self.selected = Some(Selected {
            is_calibrated: AttributeWidget::bind_proxy(Arc::clone(&proxy), "IsCalibrated", &self.sink),
            is_referenced: AttributeWidget::bind_proxy(Arc::clone(&proxy), "IsReferenced", &self.sink),
            state: AttributeWidget::bind_proxy(Arc::clone(&proxy), "State", &self.sink),
            proxy,
        });
        self.setpoint = self.position;
        Ok(())
    }

    /// Move to `value`. The set-point rolls back when the write fails.
    pub fn set_position(&mut self, value: f64) -> Result<(), UserError> {
        let previous = self.setpoint;
        let Some(selected) = &self.selected else {
            return Ok(());
        };
        self.setpoint = value;
        if let Err(e) = selected.proxy.write_attribute("Position", AttrValue::Float(value)) {
            self.setpoint = previous;
            return Err(bus_failure("Failed to set position", &e));
        }
        Ok(())
    }

    /// Copy the current position into the set-point.
    pub fn reset(&mut self) {
        if self.selected.is_some() {
            self.setpoint = self.position;
        }
    }

    pub fn calibrate(&mut self) -> Result<(), UserError> {
        self.command("Calibrate")
    }

    pub fn reference(&mut self) -> Result<(), UserError> {
        self.command("Reference")
    }

    pub fn stop(&mut self) -> Result<(), UserError> {
        self.command("Stop")
    }

    fn command(&self, command: &str) -> Result<(), UserError> {
        match &self.selected {
            Some(s) => crate::common::run_command(s.proxy.as_ref(), command, "Command failed"),
            None => Ok(()),
        }
    }
}

impl Panel for PositionerPanel {
    fn title(&self) -> &str {
        "SmarAct control"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        if let Some(selected) = &mut self.selected {
            for widget in [
                &mut selected.is_calibrated,
                &mut selected.is_referenced,
                &mut selected.state,
            ] {
                if widget.owns(event) {
                    widget.handle_event(event);
                    return;
                }
            }
        }
        if !self.subscriptions.owns(event) || !event.is_for("Position") {
            return;
        }
        if let Some(v) = event.value.as_ref().and_then(AttrValue::as_f64) {
            self.position = v;
        }
    }
}
