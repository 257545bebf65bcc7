//! Grating compressor panel.
//!
//! Position, velocity and acceleration are generic attribute widgets. The
//! panel subscribes temperature, voltage and state itself. A second tab shows
//! the optional temperature monitor, subscribed only while the tab is open.

use std::sync::Arc;

use labpanel_analysis::Ema;
use labpanel_core::attribute::{AttrValue, DevState, LabelStyle, Rgb};
use labpanel_core::bus::{ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::config::DeviceNames;
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::UserError;
use labpanel_core::widget::AttributeWidget;

use crate::common::{bus_failure, connect_critical, run_command, Panel, StatusText, Subscriptions};

/// Temperature monitor channels, in display order.
pub const MONITOR_CHANNELS: [&str; 8] = [
    "RP_SxDown", "RP_DxDown", "RP_SxUp", "RP_AMB", "RP_DxUp", "RG_Dx", "RG_Sx", "RG_AMB",
];

/// Step sizes of the move buttons.
pub const MOVE_STEPS: [i64; 4] = [1, 10, 100, 1000];

const NOT_AVAILABLE: &str = "N.A.";
const KELVIN_OFFSET: f64 = 273.15;

/// Tabs of the compressor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorTab {
    Move,
    Temperatures,
}

/// Compressor state label.
pub fn state_label(state: Option<DevState>) -> StatusText {
    match state {
        Some(DevState::Off) => StatusText::new("Off", LabelStyle::on(Rgb::WHITE)),
        Some(DevState::Standby) => StatusText::new("Standby", LabelStyle::on(Rgb::YELLOW)),
        Some(DevState::Moving) => StatusText::new("Moving", LabelStyle::on(Rgb::BLUE)),
        Some(DevState::Fault) => StatusText::new("Fault", LabelStyle::new(Rgb::RED, Rgb::WHITE)),
        _ => StatusText::new("UNKN", LabelStyle::on(Rgb::GREY)),
    }
}

struct MonitorChannel {
    text: String,
    average: Ema,
}

/// Compressor panel controller.
pub struct CompressorPanel {
    bus: Arc<dyn DeviceBus>,
    sink: EventSink,
    device: Arc<dyn DeviceProxy>,
    monitor_name: String,
    /// Position, velocity and acceleration widgets.
    pub position: AttributeWidget,
    pub velocity: AttributeWidget,
    pub acceleration: AttributeWidget,
    /// Temperature reading, `{:.1} °C`.
    pub temperature: String,
    /// Voltage reading, `{:.1} V`.
    pub voltage: String,
    pub state: StatusText,
    tab: CompressorTab,
    channels: Vec<MonitorChannel>,
    subscriptions: Subscriptions,
    monitor: Subscriptions,
}

impl CompressorPanel {
    /// Connect to the compressor and subscribe its readings.
    pub fn open(bus: Arc<dyn DeviceBus>, names: &DeviceNames, sink: EventSink) -> Result<Self, UserError> {
        let device = connect_critical(
            bus.as_ref(),
            &names.compressor,
            "Cannot connect to the compressor control device",
        )?;

        let position = AttributeWidget::bind_proxy(Arc::clone(&device), "Position", &sink);
        let velocity = AttributeWidget::bind_proxy(Arc::clone(&device), "Velocity", &sink);
        let acceleration = AttributeWidget::bind_proxy(Arc::clone(&device), "Acceleration", &sink);

        let mut subscriptions = Subscriptions::new();
        if let Err(e) = subscriptions.subscribe_all(&device, &["Temperature", "Voltage", "State"], &sink) {
            tracing::error!(error = %e, "Failed to subscribe events");
            return Err(UserError::new("Failed to connect", "Failed to connect to device events"));
        }

        Ok(Self {
            bus,
            sink,
            device,
            monitor_name: names.temperature_monitor.clone(),
            position,
            velocity,
            acceleration,
            temperature: String::new(),
            voltage: String::new(),
            state: state_label(None),
            tab: CompressorTab::Move,
            channels: MONITOR_CHANNELS
                .iter()
                .map(|_| MonitorChannel {
                    text: String::new(),
                    average: Ema::new(),
                })
                .collect(),
            subscriptions,
            monitor: Subscriptions::new(),
        })
    }

    pub fn tab(&self) -> CompressorTab {
        self.tab
    }

    /// Monitor readings, paired with their channel names.
    pub fn channel_texts(&self) -> impl Iterator<Item = (&'static str, &str)> {
        MONITOR_CHANNELS
            .iter()
            .copied()
            .zip(self.channels.iter().map(|c| c.text.as_str()))
    }

    /// Switch tab. Opening the temperature tab connects the monitor; leaving
    /// it drops the monitor subscriptions.
    ///
    /// A monitor failure returns the dialog and leaves the panel degraded.
    pub fn select_tab(&mut self, tab: CompressorTab) -> Result<(), UserError> {
        self.tab = tab;
        match tab {
            CompressorTab::Move => {
                self.monitor.clear();
                Ok(())
            }
            CompressorTab::Temperatures => self.open_monitor(),
        }
    }

    fn open_monitor(&mut self) -> Result<(), UserError> {
        let result = labpanel_core::bus::connect_checked(self.bus.as_ref(), &self.monitor_name)
            .and_then(|proxy| self.monitor.subscribe_all(&proxy, &MONITOR_CHANNELS, &self.sink));
        if let Err(e) = result {
            self.monitor.clear();
            for channel in &mut self.channels {
                channel.text = NOT_AVAILABLE.to_string();
                channel.average.reset();
            }
            return Err(bus_failure("Failed to connect to temperature monitor", &e));
        }
        Ok(())
    }

    /// Move by `delta` steps relative to the current position.
    pub fn move_by(&mut self, delta: i64) -> Result<(), UserError> {
        const TITLE: &str = "Failed to move device";
        let current = self
            .device
            .read_attribute("Position")
            .map_err(|e| bus_failure(TITLE, &e))?;
        let target = match current {
            AttrValue::Float(v) => AttrValue::Float(v + delta as f64),
            other => AttrValue::Int(other.as_i64().unwrap_or_default() + delta),
        };
        tracing::debug!(%target, "Moving compressor");
        self.device
            .write_attribute("Position", target)
            .map_err(|e| bus_failure(TITLE, &e))
    }

    pub fn stop(&mut self) -> Result<(), UserError> {
        run_command(self.device.as_ref(), "Stop", "Failed to stop device")
    }

    pub fn go_home(&mut self) -> Result<(), UserError> {
        run_command(self.device.as_ref(), "goHome", "Failed to go home")
    }

    pub fn set_home(&mut self) -> Result<(), UserError> {
        run_command(self.device.as_ref(), "setHome", "Failed to set home")
    }

    fn show_reading(&mut self, event: &ChangeEvent, value: &AttrValue) {
        let attribute = event.attribute.to_lowercase();
        match attribute.as_str() {
            "state" => self.state = state_label(value.as_state()),
            "temperature" => {
                if let Some(v) = value.as_f64() {
                    self.temperature = format!("{:.1} °C", v);
                }
            }
            "voltage" => {
                if let Some(v) = value.as_f64() {
                    self.voltage = format!("{:.1} V", v);
                }
            }
            _ => {
                let slot = MONITOR_CHANNELS
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&attribute));
                match (slot, value.as_f64()) {
                    (Some(i), Some(kelvin)) => {
                        let channel = &mut self.channels[i];
                        let celsius = channel.average.update(kelvin - KELVIN_OFFSET);
                        channel.text = format!("{:.1} °C", celsius);
                    }
                    _ => tracing::debug!(attribute = %event.attribute, "Unexpected attribute"),
                }
            }
        }
    }
}

impl Panel for CompressorPanel {
    fn title(&self) -> &str {
        "Compressor"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        for widget in [&mut self.position, &mut self.velocity, &mut self.acceleration] {
            if widget.owns(event) {
                widget.handle_event(event);
                return;
            }
        }
        if !self.subscriptions.owns(event) && !self.monitor.owns(event) {
            return;
        }
        if let Some(err) = &event.error {
            tracing::error!(attribute = %event.attribute, "Event error ({})", err.description);
            return;
        }
        tracing::debug!(attribute = %event.attribute, "Got event");
        if let Some(value) = &event.value {
            self.show_reading(event, value);
        }
    }
}
