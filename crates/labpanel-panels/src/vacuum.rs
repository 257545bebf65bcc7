//! Dry pump panel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use labpanel_core::attribute::{AttrValue, DevState, LabelStyle, Rgb};
use labpanel_core::bus::{ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::config::{DeviceNames, VacuumSettings};
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::{BusError, UserError};
use labpanel_core::format::format_exp;

use crate::common::{connect_critical, Panel, StatusText, Subscriptions};

const PUMP_ATTRIBUTES: [&str; 12] = [
    "FreqSetpoint",
    "Frequency",
    "Current",
    "Voltage",
    "Power",
    "Temperature",
    "Pressure",
    "EnablePurge",
    "EnableBallast",
    "CompressedAir",
    "WaterValve",
    "State",
];

/// Water valve label.
pub fn water_label(state: Option<DevState>) -> StatusText {
    match state {
        Some(DevState::Close) => StatusText::new("Water close", LabelStyle::on(Rgb::WHITE)),
        Some(DevState::Open) => {
            StatusText::new("Water open", LabelStyle::new(Rgb::DARK_GREEN, Rgb::WHITE))
        }
        Some(DevState::Moving) => StatusText::new("Moving...", LabelStyle::new(Rgb::BLUE, Rgb::WHITE)),
        _ => StatusText::new("Cooling error", LabelStyle::on(Rgb::ORANGE)),
    }
}

/// Pump state label.
pub fn pump_label(state: Option<DevState>) -> StatusText {
    match state {
        Some(DevState::Running) => {
            StatusText::new("Running", LabelStyle::new(Rgb::DARK_GREEN, Rgb::WHITE))
        }
        Some(DevState::Standby) => StatusText::new("Standby", LabelStyle::on(Rgb::WHITE)),
        Some(DevState::Alarm) => StatusText::new("Alarm", LabelStyle::on(Rgb::ORANGE)),
        Some(DevState::Fault) => StatusText::new("Fault", LabelStyle::new(Rgb::RED, Rgb::WHITE)),
        _ => StatusText::new("Unknown", LabelStyle::new(Rgb::RED, Rgb::WHITE)),
    }
}

/// Dry pump panel controller.
pub struct VacuumPanel {
    device: Arc<dyn DeviceProxy>,
    settings: VacuumSettings,
    pub frequency: String,
    pub current: String,
    pub voltage: String,
    pub power: String,
    pub temperature: String,
    pub pressure: String,
    pub purge: bool,
    pub ballast: bool,
    pub compressed_air: bool,
    pub water_valve: StatusText,
    pub state: StatusText,
    /// Frequency set-point text field.
    pub setpoint: String,
    setpoint_focused: bool,
    last_poll: Option<Instant>,
    subscriptions: Subscriptions,
}

impl VacuumPanel {
    pub fn open(
        bus: Arc<dyn DeviceBus>,
        names: &DeviceNames,
        settings: &VacuumSettings,
        sink: EventSink,
    ) -> Result<Self, UserError> {
        let device = connect_critical(bus.as_ref(), &names.dry_pump, "Cannot connect to the dry pump device")?;
        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe_all(&device, &PUMP_ATTRIBUTES, &sink)
            .map_err(|e| UserError::new("Failed to connect", e.message))?;
        tracing::info!(device = device.name(), "Init done");

        Ok(Self {
            device,
            settings: settings.clone(),
            frequency: String::new(),
            current: String::new(),
            voltage: String::new(),
            power: String::new(),
            temperature: String::new(),
            pressure: String::new(),
            purge: false,
            ballast: false,
            compressed_air: false,
            water_valve: StatusText::unknown(),
            state: StatusText::unknown(),
            setpoint: String::new(),
            setpoint_focused: false,
            last_poll: None,
            subscriptions,
        })
    }

    /// The set-point field gained or lost keyboard focus. Polling does not
    /// overwrite a focused field.
    pub fn set_setpoint_focus(&mut self, focused: bool) {
        self.setpoint_focused = focused;
    }

    /// Read the set-point into the text field.
    pub fn poll_setpoint(&mut self) {
        if self.setpoint_focused {
            return;
        }
        match self.device.read_attribute("FreqSetpoint") {
            Ok(value) => {
                if let Some(v) = value.as_f64() {
                    self.setpoint = format!("{}", v.trunc() as i64);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to read frequency setpoint"),
        }
    }

    /// Apply the set-point typed by the user.
    pub fn commit_setpoint(&mut self, text: &str) -> Result<(), UserError> {
        self.setpoint = text.to_string();
        let value: i64 = text
            .trim()
            .parse()
            .map_err(|_| UserError::new("Bad value", "The given value is not a valid number"))?;
        let (min, max) = (self.settings.frequency_min, self.settings.frequency_max);
        if (value as f64) < min || (value as f64) > max {
            return Err(UserError::new(
                "Bad value",
                format!("The given value is not valid. Should be between {} and {}", min, max),
            ));
        }
        tracing::info!(value, "Frequency setpoint changed");
        let set_failed = |e: BusError| {
            UserError::new("Set failed", format!("Failed to set frequency (Error: {})", e.message))
        };
        self.device
            .write_attribute("FreqSetpoint", AttrValue::Float(value as f64))
            .map_err(set_failed)?;
        let readback = self.device.read_attribute("FreqSetpoint").map_err(set_failed)?;
        if readback.as_f64() != Some(value as f64) {
            return Err(UserError::new("Setpoint failed", "Failed to set frequency setpoint"));
        }
        Ok(())
    }

    pub fn set_purge(&mut self, enabled: bool) -> Result<(), UserError> {
        self.write_flag("EnablePurge", "purge", enabled)
    }

    pub fn set_ballast(&mut self, enabled: bool) -> Result<(), UserError> {
        self.write_flag("EnableBallast", "ballast", enabled)
    }

    fn write_flag(&mut self, attribute: &str, what: &str, enabled: bool) -> Result<(), UserError> {
        self.device
            .write_attribute(attribute, AttrValue::Bool(enabled))
            .map_err(|e| UserError::new("Set failed", format!("Failed to set {} (Error: {})", what, e.message)))
    }

    pub fn start(&mut self) -> Result<(), UserError> {
        self.command("Start", "Set failed", "Failed to start pump")
    }

    pub fn stop(&mut self) -> Result<(), UserError> {
        self.command("Stop", "Stop failed", "Failed to stop pump")
    }

    pub fn reset(&mut self) -> Result<(), UserError> {
        self.command("Reset", "Reset failed", "Failed reset pump")
    }

    fn command(&self, command: &str, title: &str, message: &str) -> Result<(), UserError> {
        self.device
            .command(command, None)
            .map(|_| ())
            .map_err(|e| UserError::new(title, format!("{} (Error: {})", message, e.message)))
    }
}

impl Panel for VacuumPanel {
    fn title(&self) -> &str {
        "DryVac"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        if !self.subscriptions.owns(event) {
            return;
        }
        let Some(value) = &event.value else { return };
        let fixed = |v: &AttrValue| v.as_f64().map(|x| format!("{:.2}", x));
        match event.attribute.as_str() {
            "FreqSetpoint" => {}
            "Frequency" => self.frequency = fixed(value).unwrap_or_default(),
            "Current" => self.current = fixed(value).unwrap_or_default(),
            "Voltage" => self.voltage = fixed(value).unwrap_or_default(),
            "Power" => self.power = fixed(value).unwrap_or_default(),
            "Temperature" => {
                if let Some(t) = value.as_f64() {
                    self.temperature = format!("{}", t.trunc() as i64);
                }
            }
            "Pressure" => {
                if let Some(p) = value.as_f64() {
                    self.pressure = format_exp(p, 2, true);
                }
            }
            "EnablePurge" => self.purge = value.as_bool().unwrap_or_default(),
            "EnableBallast" => self.ballast = value.as_bool().unwrap_or_default(),
            "CompressedAir" => self.compressed_air = value.as_bool().unwrap_or_default(),
            "WaterValve" => self.water_valve = water_label(value.as_state()),
            "State" => self.state = pump_label(value.as_state()),
            other => tracing::debug!(attribute = other, "Unexpected attribute"),
        }
    }

    fn tick(&mut self, now: Instant) {
        let interval = Duration::from_millis(self.settings.poll_interval_ms);
        let due = self
            .last_poll
            .map_or(true, |at| now.saturating_duration_since(at) >= interval);
        if due {
            self.last_poll = Some(now);
            self.poll_setpoint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(water_label(Some(DevState::Close)).text, "Water close");
        assert_eq!(water_label(Some(DevState::Fault)).text, "Cooling error");
        assert_eq!(pump_label(Some(DevState::Running)).style.background, Rgb::DARK_GREEN);
        assert_eq!(pump_label(Some(DevState::On)).text, "Unknown");
    }
}
