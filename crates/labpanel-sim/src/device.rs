//! Simulated device.
//!
//! A [`SimDevice`] keeps attribute values, properties and commands in memory
//! and implements [`DeviceProxy`]. Change events are delivered synchronously
//! on the thread that changed the value. Callbacks and command handlers never
//! run while the device lock is held, so they may call back into the device.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use labpanel_core::attribute::{AttrValue, AttributeDescriptor, WriteMode};
use labpanel_core::bus::{
    ChangeEvent, CommandInfo, DeviceProxy, EventCallback, SubscriptionId, EVENT_TIMEOUT_REASON,
};
use labpanel_core::error::{BusError, BusErrorKind};
use parking_lot::Mutex;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Behaviour of a simulated command.
pub type CommandHandler =
    Arc<dyn Fn(&SimDevice, Option<AttrValue>) -> Result<AttrValue, BusError> + Send + Sync>;

/// Remote operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Command,
    Subscribe,
}

struct SimAttribute {
    descriptor: AttributeDescriptor,
    value: AttrValue,
}

struct SimCommand {
    info: CommandInfo,
    handler: Option<CommandHandler>,
}

#[derive(Default)]
struct DeviceState {
    attributes: BTreeMap<String, SimAttribute>,
    commands: BTreeMap<String, SimCommand>,
    properties: HashMap<String, Vec<String>>,
    subscribers: BTreeMap<SubscriptionId, (String, EventCallback)>,
    faults: HashMap<(Operation, String), u32>,
    write_count: HashMap<String, u32>,
}

/// In-memory device.
pub struct SimDevice {
    name: String,
    class: String,
    online: AtomicBool,
    state: Mutex<DeviceState>,
}

impl SimDevice {
    pub fn builder(name: impl Into<String>, class: impl Into<String>) -> DeviceBuilder {
        DeviceBuilder {
            device: SimDevice {
                name: name.into(),
                class: class.into(),
                online: AtomicBool::new(true),
                state: Mutex::new(DeviceState::default()),
            },
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Take the device off the bus. Every remote call then fails with a
    /// connection error.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make the next `times` operations of kind `op` on `target` (attribute
    /// or command name) fail.
    pub fn fail_next(&self, op: Operation, target: &str, times: u32) {
        self.state
            .lock()
            .faults
            .insert((op, target.to_lowercase()), times);
    }

    fn take_fault(&self, op: Operation, target: &str) -> bool {
        let mut state = self.state.lock();
        match state.faults.get_mut(&(op, target.to_lowercase())) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn check_online(&self) -> Result<(), BusError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(BusError::new(
                &self.name,
                BusErrorKind::Connection,
                format!("Device {} is not exported", self.name),
            ))
        }
    }

    /// Current value of `attribute`.
    pub fn value(&self, attribute: &str) -> Option<AttrValue> {
        self.state
            .lock()
            .attributes
            .get(&attribute.to_lowercase())
            .map(|a| a.value.clone())
    }

    /// Number of successful remote writes to `attribute`.
    pub fn write_count(&self, attribute: &str) -> u32 {
        self.state
            .lock()
            .write_count
            .get(&attribute.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Replace the value of `attribute` and notify its subscribers.
    ///
    /// Unknown attributes are logged and ignored.
    pub fn set_value(&self, attribute: &str, value: AttrValue) {
        let key = attribute.to_lowercase();
        let (name, targets) = {
            let mut state = self.state.lock();
            let Some(attr) = state.attributes.get_mut(&key) else {
                tracing::warn!(device = %self.name, attribute, "Setting unknown attribute");
                return;
            };
            attr.value = value.clone();
            let name = attr.descriptor.name.clone();
            (name, Self::subscribers_of(&state, &key))
        };
        for (id, callback) in targets {
            callback(ChangeEvent::value(id, &self.name, &name, value.clone()));
        }
    }

    /// Push an error event to the subscribers of `attribute`.
    pub fn emit_error(&self, attribute: &str, reason: &str, description: &str) {
        let key = attribute.to_lowercase();
        let (name, targets) = {
            let state = self.state.lock();
            let name = state
                .attributes
                .get(&key)
                .map(|a| a.descriptor.name.clone())
                .unwrap_or_else(|| attribute.to_string());
            (name, Self::subscribers_of(&state, &key))
        };
        for (id, callback) in targets {
            callback(ChangeEvent::error(id, &self.name, &name, reason, description));
        }
    }

    /// Push an event-channel timeout to every subscriber of the device.
    pub fn emit_timeout(&self) {
        let targets: Vec<String> = {
            let state = self.state.lock();
            let mut attrs: Vec<String> = state.subscribers.values().map(|(a, _)| a.clone()).collect();
            attrs.sort();
            attrs.dedup();
            attrs
        };
        for attr in targets {
            self.emit_error(&attr, EVENT_TIMEOUT_REASON, "Event channel is not responding anymore");
        }
    }

    /// Active subscriptions on `attribute`.
    pub fn subscriber_count(&self, attribute: &str) -> usize {
        let key = attribute.to_lowercase();
        self.state
            .lock()
            .subscribers
            .values()
            .filter(|(a, _)| *a == key)
            .count()
    }

    /// Property value as stored in the database, regardless of the device
    /// being online.
    pub fn stored_property(&self, key: &str) -> Vec<String> {
        self.state
            .lock()
            .properties
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_property(&self, key: &str, values: Vec<String>) {
        self.state.lock().properties.insert(key.to_string(), values);
    }

    fn subscribers_of(state: &DeviceState, key: &str) -> Vec<(SubscriptionId, EventCallback)> {
        state
            .subscribers
            .iter()
            .filter(|(_, (a, _))| a == key)
            .map(|(id, (_, cb))| (*id, Arc::clone(cb)))
            .collect()
    }

    fn check_write(&self, descriptor: &AttributeDescriptor, value: &AttrValue) -> Result<(), BusError> {
        if descriptor.write_mode == WriteMode::Read {
            return Err(BusError::new(
                &self.name,
                BusErrorKind::Write,
                format!("Attribute {} is not writable", descriptor.name),
            ));
        }
        if let Some(v) = value.as_f64().filter(|_| descriptor.data_type.is_numeric()) {
            let below = descriptor.min.is_some_and(|min| v < min);
            let above = descriptor.max.is_some_and(|max| v > max);
            if below || above {
                return Err(BusError::new(
                    &self.name,
                    BusErrorKind::Write,
                    format!(
                        "Value {} of {} is out of range [{}, {}]",
                        v,
                        descriptor.name,
                        descriptor.min.unwrap_or(f64::NEG_INFINITY),
                        descriptor.max.unwrap_or(f64::INFINITY)
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("online", &self.is_online())
            .finish()
    }
}

impl DeviceProxy for SimDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> Result<Duration, BusError> {
        self.check_online()?;
        Ok(Duration::from_micros(120))
    }

    fn read_attribute(&self, attribute: &str) -> Result<AttrValue, BusError> {
        self.check_online()?;
        if self.take_fault(Operation::Read, attribute) {
            return Err(BusError::new(
                &self.name,
                BusErrorKind::Read,
                format!("Failed to read attribute {}", attribute),
            ));
        }
        self.value(attribute)
            .ok_or_else(|| BusError::not_found(&self.name, attribute))
    }

    fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<(), BusError> {
        self.check_online()?;
        let descriptor = self.attribute_config(attribute)?;
        if self.take_fault(Operation::Write, attribute) {
            return Err(BusError::new(
                &self.name,
                BusErrorKind::Write,
                format!("Failed to write attribute {}", attribute),
            ));
        }
        self.check_write(&descriptor, &value)?;
        tracing::debug!(device = %self.name, attribute, %value, "Simulated write");
        *self
            .state
            .lock()
            .write_count
            .entry(attribute.to_lowercase())
            .or_default() += 1;
        self.set_value(attribute, value);
        Ok(())
    }

    fn attribute_config(&self, attribute: &str) -> Result<AttributeDescriptor, BusError> {
        self.check_online()?;
        self.state
            .lock()
            .attributes
            .get(&attribute.to_lowercase())
            .map(|a| a.descriptor.clone())
            .ok_or_else(|| BusError::not_found(&self.name, attribute))
    }

    fn attribute_list(&self) -> Result<Vec<String>, BusError> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .attributes
            .values()
            .map(|a| a.descriptor.name.clone())
            .collect())
    }

    fn subscribe(&self, attribute: &str, callback: EventCallback) -> Result<SubscriptionId, BusError> {
        self.check_online()?;
        let key = attribute.to_lowercase();
        if self.take_fault(Operation::Subscribe, attribute) {
            return Err(BusError::new(
                &self.name,
                BusErrorKind::Subscription,
                format!("Event subscription to {} failed", attribute),
            ));
        }
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        let (name, current) = {
            let mut state = self.state.lock();
            let Some(attr) = state.attributes.get(&key) else {
                return Err(BusError::new(
                    &self.name,
                    BusErrorKind::Subscription,
                    format!("Attribute {} not found", attribute),
                ));
            };
            let snapshot = (attr.descriptor.name.clone(), attr.value.clone());
            state.subscribers.insert(id, (key, Arc::clone(&callback)));
            snapshot
        };
        tracing::debug!(device = %self.name, attribute = %name, subscription = %id, "Subscribed");
        callback(ChangeEvent::value(id, &self.name, name, current));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        match self.state.lock().subscribers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(BusError::new(
                &self.name,
                BusErrorKind::Subscription,
                format!("Unknown subscription {}", id),
            )),
        }
    }

    fn command(&self, command: &str, argument: Option<AttrValue>) -> Result<AttrValue, BusError> {
        self.check_online()?;
        let handler = {
            let state = self.state.lock();
            let cmd = state
                .commands
                .get(&command.to_lowercase())
                .ok_or_else(|| BusError::not_found(&self.name, command))?;
            cmd.handler.clone()
        };
        if self.take_fault(Operation::Command, command) {
            return Err(BusError::new(
                &self.name,
                BusErrorKind::Command,
                format!("Command {} failed", command),
            ));
        }
        tracing::debug!(device = %self.name, command, ?argument, "Simulated command");
        match handler {
            Some(handler) => handler(self, argument),
            None => Ok(AttrValue::Void),
        }
    }

    fn command_list(&self) -> Result<Vec<String>, BusError> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .commands
            .values()
            .map(|c| c.info.name.clone())
            .collect())
    }

    fn command_info(&self, command: &str) -> Result<CommandInfo, BusError> {
        self.check_online()?;
        self.state
            .lock()
            .commands
            .get(&command.to_lowercase())
            .map(|c| c.info.clone())
            .ok_or_else(|| BusError::not_found(&self.name, command))
    }

    fn property(&self, key: &str) -> Result<Vec<String>, BusError> {
        self.check_online()?;
        Ok(self.stored_property(key))
    }
}

/// Builder of a [`SimDevice`].
pub struct DeviceBuilder {
    device: SimDevice,
}

impl DeviceBuilder {
    /// Declare an attribute with its initial value.
    pub fn attribute(self, descriptor: AttributeDescriptor, value: AttrValue) -> Self {
        self.device.state.lock().attributes.insert(
            descriptor.name.to_lowercase(),
            SimAttribute { descriptor, value },
        );
        self
    }

    /// Declare a command without argument or result that does nothing.
    pub fn command(self, name: &str) -> Self {
        self.command_info(CommandInfo::void(name), None)
    }

    /// Declare a command without argument whose handler runs on execution.
    pub fn command_fn<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&SimDevice, Option<AttrValue>) -> Result<AttrValue, BusError> + Send + Sync + 'static,
    {
        self.command_info(CommandInfo::void(name), Some(Arc::new(handler)))
    }

    /// Declare a command with full type information.
    pub fn command_info(self, info: CommandInfo, handler: Option<CommandHandler>) -> Self {
        self.device
            .state
            .lock()
            .commands
            .insert(info.name.to_lowercase(), SimCommand { info, handler });
        self
    }

    pub fn property(self, key: &str, values: &[&str]) -> Self {
        self.device.set_property(key, values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn build(self) -> Arc<SimDevice> {
        Arc::new(self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labpanel_core::attribute::{DataType, DevState};
    use parking_lot::Mutex as PlMutex;

    fn valve() -> Arc<SimDevice> {
        SimDevice::builder("lab/cooling/valve_1", "Valve")
            .attribute(
                AttributeDescriptor::new("State", DataType::State),
                AttrValue::State(DevState::Close),
            )
            .attribute(
                AttributeDescriptor::new("Setpoint", DataType::Double)
                    .writable()
                    .with_range(0.0, 10.0),
                AttrValue::Float(1.0),
            )
            .command_fn("Open", |dev, _| {
                dev.set_value("State", AttrValue::State(DevState::Open));
                Ok(AttrValue::Void)
            })
            .build()
    }

    fn recorder() -> (EventCallback, Arc<PlMutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Arc::new(move |ev| sink.lock().push(ev)), seen)
    }

    #[test]
    fn subscribe_emits_current_value_then_changes() {
        let dev = valve();
        let (cb, seen) = recorder();
        let id = dev.subscribe("state", cb).unwrap();
        dev.command("open", None).unwrap();
        let events = seen.lock().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].attribute, "State");
        assert_eq!(events[1].value, Some(AttrValue::State(DevState::Open)));
        dev.unsubscribe(id).unwrap();
        assert_eq!(dev.subscriber_count("State"), 0);
        assert!(dev.unsubscribe(id).is_err());
    }

    #[test]
    fn writes_are_checked() {
        let dev = valve();
        assert!(dev.write_attribute("State", AttrValue::State(DevState::On)).is_err());
        let err = dev.write_attribute("Setpoint", AttrValue::Float(11.0)).unwrap_err();
        assert_eq!(err.kind, BusErrorKind::Write);
        dev.write_attribute("Setpoint", AttrValue::Float(2.0)).unwrap();
        assert_eq!(dev.value("setpoint"), Some(AttrValue::Float(2.0)));
        assert_eq!(dev.write_count("SETPOINT"), 1);
    }

    #[test]
    fn injected_faults_are_consumed() {
        let dev = valve();
        dev.fail_next(Operation::Command, "Open", 1);
        assert_eq!(dev.command("Open", None).unwrap_err().kind, BusErrorKind::Command);
        assert!(dev.command("Open", None).is_ok());
    }

    #[test]
    fn offline_device_refuses_calls() {
        let dev = valve();
        dev.set_online(false);
        assert_eq!(dev.ping().unwrap_err().kind, BusErrorKind::Connection);
        assert!(dev.read_attribute("State").is_err());
        dev.set_online(true);
        assert!(dev.ping().is_ok());
    }

    #[test]
    fn timeout_reaches_every_subscriber() {
        let dev = valve();
        let (cb, seen) = recorder();
        dev.subscribe("State", Arc::clone(&cb)).unwrap();
        dev.subscribe("Setpoint", cb).unwrap();
        dev.emit_timeout();
        let timeouts = seen.lock().iter().filter(|e| e.is_timeout()).count();
        assert_eq!(timeouts, 2);
    }
}
