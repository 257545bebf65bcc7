//! Cooling water panel: two valve toggle buttons plus valve and chiller
//! status widgets.

use std::sync::Arc;

use labpanel_core::attribute::DevState;
use labpanel_core::bus::{ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::config::DeviceNames;
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::UserError;
use labpanel_core::widget::AttributeWidget;

use crate::common::{connect_critical, Panel, Subscriptions};

const VALVE_ERROR: &str = "Error!";
const CHILLER_ATTRIBUTES: [&str; 5] = ["Temperature", "PercentOutput", "FanSpeed", "MotorCurrent", "State"];

/// Label and enablement of a valve toggle button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValveButton {
    pub text: &'static str,
    pub enabled: bool,
}

impl ValveButton {
    pub fn for_state(state: Option<DevState>) -> Self {
        match state {
            Some(DevState::Open) => Self {
                text: "Close",
                enabled: true,
            },
            Some(DevState::Close) => Self {
                text: "Open",
                enabled: true,
            },
            _ => Self {
                text: "N.A.",
                enabled: false,
            },
        }
    }
}

/// The two operable valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valve {
    Xuv,
    Vmi,
}

/// Cooling panel controller.
pub struct CoolingPanel {
    xuv: Arc<dyn DeviceProxy>,
    vmi: Arc<dyn DeviceProxy>,
    pub xuv_button: ValveButton,
    pub vmi_button: ValveButton,
    /// Valve state widgets with their display labels.
    pub valves: Vec<(String, AttributeWidget)>,
    /// Chiller readings.
    pub chiller: Vec<AttributeWidget>,
    subscriptions: Subscriptions,
}

impl CoolingPanel {
    pub fn open(bus: Arc<dyn DeviceBus>, names: &DeviceNames, sink: EventSink) -> Result<Self, UserError> {
        let xuv = connect_critical(bus.as_ref(), &names.valve_xuv, "The XUV valve device is not running")?;
        let vmi = connect_critical(bus.as_ref(), &names.valve_vmi, "The VMI valve device is not running")?;

        let mut subscriptions = Subscriptions::new();
        for valve in [&xuv, &vmi] {
            subscriptions
                .subscribe(valve, "State", &sink)
                .map_err(|e| UserError::new("Failed to connect", e.message))?;
        }

        let valves = names
            .cooling_valves
            .iter()
            .map(|(label, device)| {
                (
                    label.clone(),
                    AttributeWidget::bind(bus.as_ref(), &format!("{}/State", device), &sink),
                )
            })
            .collect();
        let chiller = CHILLER_ATTRIBUTES
            .iter()
            .map(|attr| AttributeWidget::bind(bus.as_ref(), &format!("{}/{}", names.chiller, attr), &sink))
            .collect();

        Ok(Self {
            xuv,
            vmi,
            xuv_button: ValveButton::for_state(None),
            vmi_button: ValveButton::for_state(None),
            valves,
            chiller,
            subscriptions,
        })
    }

    /// Open a closed valve or close an open one.
    pub fn toggle(&mut self, valve: Valve) -> Result<(), UserError> {
        let device = match valve {
            Valve::Xuv => &self.xuv,
            Valve::Vmi => &self.vmi,
        };
        let cannot_operate = || UserError::new(VALVE_ERROR, "Cannot operate the valve!");
        let state = device
            .read_attribute("State")
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to read valve state");
                cannot_operate()
            })?
            .as_state();
        let command = match state {
            Some(DevState::Open) => "Close",
            Some(DevState::Close) => "Open",
            _ => return Err(cannot_operate()),
        };
        tracing::info!(device = device.name(), command, "Operating valve");
        device.command(command, None).map(|_| ()).map_err(|e| {
            tracing::error!(error = %e, "Valve command failed");
            cannot_operate()
        })
    }
}

impl Panel for CoolingPanel {
    fn title(&self) -> &str {
        "Cooling"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        let widgets = self
            .valves
            .iter_mut()
            .map(|(_, w)| w)
            .chain(self.chiller.iter_mut());
        for widget in widgets {
            if widget.owns(event) {
                widget.handle_event(event);
                return;
            }
        }
        if !self.subscriptions.owns(event) || event.is_error() {
            return;
        }
        if !event.is_for("State") {
            tracing::debug!(attribute = %event.attribute, "Unexpected attribute");
            return;
        }
        let button = ValveButton::for_state(event.value.as_ref().and_then(|v| v.as_state()));
        if event.device.eq_ignore_ascii_case(self.xuv.name()) {
            self.xuv_button = button;
        } else if event.device.eq_ignore_ascii_case(self.vmi.name()) {
            self.vmi_button = button;
        }
    }
}
