//! Cryostat panel: vacuum and temperature readings, status LEDs and the
//! compressor start/stop buttons.

use std::sync::Arc;
use std::time::Instant;

use labpanel_core::attribute::{AttrValue, DevState};
use labpanel_core::bus::{connect_checked, ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::config::DeviceNames;
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::UserError;

use crate::common::{run_command, Led, LedState, Panel, Subscriptions, DEVICE_NOT_FOUND};

const CRYO_ATTRIBUTES: [&str; 7] = [
    "pressure",
    "temperature",
    "delta",
    "pump_status",
    "vacuum_status",
    "compressor_status",
    "temperature_status",
];

/// LED state of `pump_status`.
pub fn pump_led(code: i64) -> Option<LedState> {
    match code {
        0 => Some(LedState::Off),
        1 => Some(LedState::On),
        2 => Some(LedState::Error),
        _ => None,
    }
}

/// LED state of `vacuum_status`.
pub fn vacuum_led(code: i64) -> Option<LedState> {
    match code {
        0 => Some(LedState::Error),
        1 => Some(LedState::On),
        2 => Some(LedState::Blinking),
        _ => None,
    }
}

/// LED state of `compressor_status`.
pub fn compressor_led(code: i64) -> Option<LedState> {
    match code {
        0 => Some(LedState::Off),
        1 => Some(LedState::Blinking),
        2 => Some(LedState::On),
        _ => None,
    }
}

/// LED state of `temperature_status`.
pub fn temperature_led(code: i64) -> Option<LedState> {
    match code {
        0 => Some(LedState::Error),
        1 => Some(LedState::Off),
        2 => Some(LedState::Blinking),
        3 => Some(LedState::On),
        _ => None,
    }
}

/// LED state of the water valve.
pub fn water_led(state: Option<DevState>) -> LedState {
    match state {
        Some(DevState::Open) => LedState::On,
        Some(DevState::Close) => LedState::Off,
        _ => LedState::Error,
    }
}

/// Cryostat panel controller.
pub struct CryostatPanel {
    device: Arc<dyn DeviceProxy>,
    water: Arc<dyn DeviceProxy>,
    /// Pressure, `{:6.2e} mbar`.
    pub pressure: String,
    /// Cold head temperature, integer °C.
    pub temperature: String,
    /// Temperature delta, integer °C.
    pub delta: String,
    pub pump_status: Led,
    pub vacuum_status: Led,
    pub compressor_status: Led,
    pub temperature_status: Led,
    pub water_status: Led,
    /// Start button enabled; the stop button is enabled otherwise.
    pub start_enabled: bool,
    offline: Vec<String>,
    subscriptions: Subscriptions,
}

impl CryostatPanel {
    pub fn open(bus: Arc<dyn DeviceBus>, names: &DeviceNames, sink: EventSink) -> Result<Self, UserError> {
        let device = crate::common::connect_critical(
            bus.as_ref(),
            &names.cryostat,
            "The Cryostar device is not running",
        )?;
        let water = bus
            .device_property(&names.cryostat, "water_valve")
            .and_then(|values| {
                let name = values.first().cloned().unwrap_or_default();
                connect_checked(bus.as_ref(), &name)
            })
            .map_err(|e| {
                tracing::error!(error = %e, "Water valve unavailable");
                UserError::new(DEVICE_NOT_FOUND, "The water valve device is missing or is not running")
            })?;

        let mut subscriptions = Subscriptions::new();
        subscriptions
            .subscribe_all(&device, &CRYO_ATTRIBUTES, &sink)
            .and_then(|_| subscriptions.subscribe(&water, "State", &sink).map(|_| ()))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to subscribe events");
                UserError::new("Failed to connect", e.message)
            })?;

        Ok(Self {
            device,
            water,
            pressure: String::new(),
            temperature: String::new(),
            delta: String::new(),
            pump_status: Led::default(),
            vacuum_status: Led::default(),
            compressor_status: Led::default(),
            temperature_status: Led::default(),
            water_status: Led::default(),
            start_enabled: true,
            offline: Vec::new(),
            subscriptions,
        })
    }

    /// Name of the water valve device read from the cryostat properties.
    pub fn water_valve(&self) -> &str {
        self.water.name()
    }

    /// Devices whose event channel timed out.
    pub fn offline_devices(&self) -> &[String] {
        &self.offline
    }

    pub fn start_compressor(&mut self) -> Result<(), UserError> {
        run_command(self.device.as_ref(), "startCompressor", "Failed to start compressor")
    }

    pub fn stop_compressor(&mut self) -> Result<(), UserError> {
        run_command(self.device.as_ref(), "stopCompressor", "Failed to stop compressor")
    }

    fn cryo_event(&mut self, attribute: &str, value: &AttrValue) {
        let code = value.as_i64();
        let set = |led: &mut Led, state: Option<LedState>| {
            if let Some(state) = state {
                led.set(state);
            }
        };
        match attribute {
            "pressure" => {
                if let Some(p) = value.as_f64() {
                    self.pressure = format!(
                        "{:>6} mbar",
                        labpanel_core::format::format_exp(p, 2, false)
                    );
                }
            }
            "temperature" => {
                if let Some(t) = value.as_f64() {
                    self.temperature = format!("{} °C", t.round() as i64);
                }
            }
            "delta" => {
                if let Some(t) = value.as_f64() {
                    self.delta = format!("{} °C", t.round() as i64);
                }
            }
            "pump_status" => set(&mut self.pump_status, code.and_then(pump_led)),
            "vacuum_status" => set(&mut self.vacuum_status, code.and_then(vacuum_led)),
            "compressor_status" => {
                set(&mut self.compressor_status, code.and_then(compressor_led));
                self.start_enabled = code != Some(2);
            }
            "temperature_status" => set(&mut self.temperature_status, code.and_then(temperature_led)),
            other => tracing::warn!(attribute = other, "Event from unexpected attribute"),
        }
    }
}

impl Panel for CryostatPanel {
    fn title(&self) -> &str {
        "Cryostar"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        if !self.subscriptions.owns(event) {
            return;
        }
        if let Some(err) = &event.error {
            if event.is_timeout() {
                tracing::warn!(device = %event.device, "Device is offline");
                if !self.offline.contains(&event.device) {
                    self.offline.push(event.device.clone());
                }
            } else {
                tracing::error!(device = %event.device, reason = %err.reason, "Event error: {}", err.description);
            }
            return;
        }
        let Some(value) = &event.value else { return };
        self.offline.retain(|d| d != &event.device);

        let attribute = event.attribute.to_lowercase();
        if event.device.eq_ignore_ascii_case(self.device.name()) {
            self.cryo_event(&attribute, value);
        } else if event.device.eq_ignore_ascii_case(self.water.name()) {
            if attribute == "state" {
                self.water_status.set(water_led(value.as_state()));
            } else {
                tracing::warn!(attribute = %event.attribute, "Event from unexpected attribute");
            }
        } else {
            tracing::warn!(device = %event.device, "Event from unexpected device");
        }
    }

    fn tick(&mut self, now: Instant) {
        for led in [
            &mut self.pump_status,
            &mut self.vacuum_status,
            &mut self.compressor_status,
            &mut self.temperature_status,
            &mut self.water_status,
        ] {
            led.tick(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_tables() {
        assert_eq!(pump_led(2), Some(LedState::Error));
        assert_eq!(vacuum_led(2), Some(LedState::Blinking));
        assert_eq!(compressor_led(1), Some(LedState::Blinking));
        assert_eq!(temperature_led(1), Some(LedState::Off));
        assert_eq!(temperature_led(7), None);
        assert_eq!(water_led(Some(DevState::Open)), LedState::On);
        assert_eq!(water_led(Some(DevState::Moving)), LedState::Error);
        assert_eq!(water_led(None), LedState::Error);
    }
}
