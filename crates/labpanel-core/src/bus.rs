//! Device bus abstraction.
//!
//! The control panels talk to hardware through a distributed device bus:
//! named devices expose typed attributes, commands and configuration
//! properties, and push change events to subscribers. The traits in this
//! module are the seam between the panels and a concrete bus client.
//!
//! All calls are synchronous. A panel issues them from the UI thread and a
//! slow device stalls that thread; there is no timeout layer here.
//!
//! Change-event callbacks run on a thread owned by the bus. They must not
//! touch UI state directly: panels hand them an
//! [`EventSink`](crate::dispatch::EventSink) that queues the event for the
//! UI thread.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::attribute::{AttrValue, AttributeDescriptor, DataType};
use crate::error::BusError;

/// Reason string attached to events that report an event-channel timeout.
pub const EVENT_TIMEOUT_REASON: &str = "API_EventTimeout";

/// Handle returned by [`DeviceProxy::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Error carried inside a change event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventError {
    /// Machine readable reason, e.g. [`EVENT_TIMEOUT_REASON`].
    pub reason: String,
    /// Human readable description.
    pub description: String,
}

/// Asynchronous notification for one subscribed attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Subscription that produced the event.
    pub subscription: SubscriptionId,
    /// Device that owns the attribute.
    pub device: String,
    /// Attribute name as reported by the device.
    pub attribute: String,
    /// New value, absent when `error` is set.
    pub value: Option<AttrValue>,
    /// Error reported instead of a value.
    pub error: Option<EventError>,
    /// Time the event was emitted.
    pub timestamp: SystemTime,
}

impl ChangeEvent {
    /// Event carrying a value.
    pub fn value(
        subscription: SubscriptionId,
        device: impl Into<String>,
        attribute: impl Into<String>,
        value: AttrValue,
    ) -> Self {
        Self {
            subscription,
            device: device.into(),
            attribute: attribute.into(),
            value: Some(value),
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Event carrying an error.
    pub fn error(
        subscription: SubscriptionId,
        device: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subscription,
            device: device.into(),
            attribute: attribute.into(),
            value: None,
            error: Some(EventError {
                reason: reason.into(),
                description: description.into(),
            }),
            timestamp: SystemTime::now(),
        }
    }

    /// The event reports an error instead of a value.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The event reports that the event channel timed out.
    pub fn is_timeout(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.reason == EVENT_TIMEOUT_REASON)
    }

    /// Case-insensitive attribute name comparison.
    pub fn is_for(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }
}

/// Callback invoked by the bus for every change event.
pub type EventCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Argument and result description of a device command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInfo {
    pub name: String,
    /// Input type, `None` for commands without argument.
    pub in_type: Option<ArgType>,
    pub in_description: String,
    /// Output type, `None` for commands without result.
    pub out_type: Option<ArgType>,
    pub out_description: String,
}

impl CommandInfo {
    /// Command taking and returning nothing.
    pub fn void(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_type: None,
            in_description: "Uninitialised".into(),
            out_type: None,
            out_description: "Uninitialised".into(),
        }
    }
}

/// Command argument type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// Scalar of the given data type.
    Scalar(DataType),
    /// Homogeneous array of the given data type.
    Array(DataType),
    /// Mixed numeric/string arrays (`DevVarLongStringArray` and friends).
    MixedArray,
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::Scalar(t) => write!(f, "Dev{:?}", t),
            ArgType::Array(t) => write!(f, "DevVar{:?}Array", t),
            ArgType::MixedArray => f.write_str("DevVarMixedArray"),
        }
    }
}

/// Connection to one device.
pub trait DeviceProxy: Send + Sync {
    /// Fully qualified device name.
    fn name(&self) -> &str;

    /// Round-trip check. Returns the elapsed time.
    fn ping(&self) -> Result<Duration, BusError>;

    fn read_attribute(&self, attribute: &str) -> Result<AttrValue, BusError>;

    fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<(), BusError>;

    /// Metadata of one attribute.
    fn attribute_config(&self, attribute: &str) -> Result<AttributeDescriptor, BusError>;

    /// Names of all attributes, in device declaration order.
    fn attribute_list(&self) -> Result<Vec<String>, BusError>;

    /// Subscribe to change events of `attribute`.
    ///
    /// The bus emits the current value right after a successful
    /// subscription, like a real event channel does.
    fn subscribe(&self, attribute: &str, callback: EventCallback)
        -> Result<SubscriptionId, BusError>;

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;

    /// Execute a command. `argument` is `None` for void commands.
    fn command(&self, command: &str, argument: Option<AttrValue>) -> Result<AttrValue, BusError>;

    fn command_list(&self) -> Result<Vec<String>, BusError>;

    fn command_info(&self, command: &str) -> Result<CommandInfo, BusError>;

    /// Device property values. Missing properties yield an empty list.
    fn property(&self, key: &str) -> Result<Vec<String>, BusError>;
}

/// Entry point of the device bus: proxy factory and configuration database.
pub trait DeviceBus: Send + Sync {
    /// Create a proxy for `device`. Fails if the device is not exported.
    fn connect(&self, device: &str) -> Result<Arc<dyn DeviceProxy>, BusError>;

    /// Names of exported devices of a device class.
    fn exported_devices(&self, class: &str) -> Result<Vec<String>, BusError>;

    /// Device property values, read without connecting to the device.
    fn device_property(&self, device: &str, key: &str) -> Result<Vec<String>, BusError>;

    /// Free (object level) property values.
    fn get_property(&self, object: &str, key: &str) -> Result<Vec<String>, BusError>;

    /// Store free (object level) property values.
    fn put_property(&self, object: &str, key: &str, values: Vec<String>) -> Result<(), BusError>;
}

/// Connect to `device` and ping it.
pub fn connect_checked(bus: &dyn DeviceBus, device: &str) -> Result<Arc<dyn DeviceProxy>, BusError> {
    let proxy = bus.connect(device)?;
    proxy.ping()?;
    Ok(proxy)
}

/// Exported devices of `class` that answer a ping.
///
/// Unreachable devices are logged and skipped.
pub fn live_devices_by_class(bus: &dyn DeviceBus, class: &str) -> Result<Vec<String>, BusError> {
    let mut live = Vec::new();
    for device in bus.exported_devices(class)? {
        match connect_checked(bus, &device) {
            Ok(_) => live.push(device),
            Err(e) => tracing::warn!(device = %device, error = %e, "Device is not reachable"),
        }
    }
    Ok(live)
}

/// Interpret a property list as a boolean flag (`true`, `1`, `yes`).
pub fn property_flag(values: &[String]) -> bool {
    values.first().is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_matching_ignores_case() {
        let ev = ChangeEvent::value(SubscriptionId(1), "a/b/c", "Position", AttrValue::Float(1.0));
        assert!(ev.is_for("position"));
        assert!(!ev.is_for("velocity"));
        assert!(!ev.is_error());
    }

    #[test]
    fn timeout_events_are_recognised() {
        let ev = ChangeEvent::error(
            SubscriptionId(2),
            "a/b/c",
            "pressure",
            EVENT_TIMEOUT_REASON,
            "Event channel is not responding anymore",
        );
        assert!(ev.is_error());
        assert!(ev.is_timeout());
    }

    #[test]
    fn property_flags() {
        assert!(property_flag(&["True".to_string()]));
        assert!(property_flag(&["1".to_string()]));
        assert!(!property_flag(&["false".to_string()]));
        assert!(!property_flag(&[]));
    }
}
