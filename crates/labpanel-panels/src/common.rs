//! Pieces shared by the panel controllers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use labpanel_core::attribute::{LabelStyle, Rgb};
use labpanel_core::bus::{ChangeEvent, DeviceBus, DeviceProxy, SubscriptionId};
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::{BusError, UserError};

/// Title of the dialog shown when a critical device is missing.
pub const DEVICE_NOT_FOUND: &str = "Device not found";

/// A headless panel.
///
/// The front-end owns the [`EventBridge`](labpanel_core::dispatch::EventBridge)
/// whose sink was given to the panel, drains it once per frame and forwards
/// each event here. `tick` is called once per frame as well.
pub trait Panel {
    /// Window title.
    fn title(&self) -> &str;

    /// Apply one change event on the UI thread.
    fn handle_event(&mut self, event: &ChangeEvent);

    /// Advance timers (blinking LEDs, polling).
    fn tick(&mut self, _now: Instant) {}
}

/// Connect to a device the panel cannot work without.
///
/// Failure yields the dialog shown before the panel exits.
pub fn connect_critical(
    bus: &dyn DeviceBus,
    device: &str,
    message: &str,
) -> Result<Arc<dyn DeviceProxy>, UserError> {
    labpanel_core::bus::connect_checked(bus, device).map_err(|e| {
        tracing::error!(device, error = %e, "Critical device unavailable");
        UserError::new(DEVICE_NOT_FOUND, message)
    })
}

/// Dialog for a failed remote call.
pub fn bus_failure(title: &str, err: &BusError) -> UserError {
    tracing::error!(device = %err.device, kind = %err.kind, "{}: {}", title, err.message);
    UserError::new(title, err.message.clone())
}

/// Run a void command, mapping a failure to a dialog with `title`.
pub fn run_command(proxy: &dyn DeviceProxy, command: &str, title: &str) -> Result<(), UserError> {
    tracing::info!(device = proxy.name(), command, "Executing command");
    proxy
        .command(command, None)
        .map(|_| ())
        .map_err(|e| bus_failure(title, &e))
}

/// Drop a trailing unit from user input, e.g. `"100 ms"` with `"ms"`.
pub fn strip_unit<'a>(text: &'a str, unit: &str) -> &'a str {
    let trimmed = text.trim();
    trimmed
        .strip_suffix(unit)
        .map(str::trim_end)
        .unwrap_or(trimmed)
}

// =============================================================================
// Subscriptions
// =============================================================================

struct Entry {
    proxy: Arc<dyn DeviceProxy>,
    attribute: String,
    id: SubscriptionId,
}

/// Event subscriptions owned by one controller.
///
/// Holds at most one subscription per (device, attribute) pair. Everything
/// still subscribed is released on drop.
#[derive(Default)]
pub struct Subscriptions {
    entries: Vec<Entry>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `attribute` of `proxy`, reusing an existing subscription.
    pub fn subscribe(
        &mut self,
        proxy: &Arc<dyn DeviceProxy>,
        attribute: &str,
        sink: &EventSink,
    ) -> Result<SubscriptionId, BusError> {
        if let Some(id) = self.find(proxy.name(), attribute) {
            return Ok(id);
        }
        let id = proxy.subscribe(attribute, sink.callback())?;
        tracing::debug!(device = proxy.name(), attribute, subscription = %id, "Subscribed");
        self.entries.push(Entry {
            proxy: Arc::clone(proxy),
            attribute: attribute.to_string(),
            id,
        });
        Ok(id)
    }

    /// Subscribe several attributes, stopping at the first failure.
    pub fn subscribe_all(
        &mut self,
        proxy: &Arc<dyn DeviceProxy>,
        attributes: &[&str],
        sink: &EventSink,
    ) -> Result<(), BusError> {
        for attribute in attributes {
            self.subscribe(proxy, attribute, sink)?;
        }
        Ok(())
    }

    /// Subscription of (device, attribute), compared case-insensitively.
    pub fn find(&self, device: &str, attribute: &str) -> Option<SubscriptionId> {
        self.entries
            .iter()
            .find(|e| {
                e.proxy.name().eq_ignore_ascii_case(device)
                    && e.attribute.eq_ignore_ascii_case(attribute)
            })
            .map(|e| e.id)
    }

    /// The event was produced by one of these subscriptions.
    pub fn owns(&self, event: &ChangeEvent) -> bool {
        self.entries.iter().any(|e| e.id == event.subscription)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every subscription of `device`.
    pub fn release_device(&mut self, device: &str) {
        let (gone, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.proxy.name().eq_ignore_ascii_case(device));
        self.entries = kept;
        gone.iter().for_each(Self::release);
    }

    /// Release everything.
    pub fn clear(&mut self) {
        for entry in std::mem::take(&mut self.entries) {
            Self::release(&entry);
        }
    }

    fn release(entry: &Entry) {
        if let Err(e) = entry.proxy.unsubscribe(entry.id) {
            tracing::warn!(
                device = entry.proxy.name(),
                attribute = %entry.attribute,
                error = %e,
                "Error unsubscribing"
            );
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|e| format!("{}/{} ({})", e.proxy.name(), e.attribute, e.id)),
            )
            .finish()
    }
}

// =============================================================================
// Display state
// =============================================================================

/// Text of a colored status label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusText {
    pub text: String,
    pub style: LabelStyle,
}

impl StatusText {
    pub fn new(text: impl Into<String>, style: LabelStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Grey label shown before the first event.
    pub fn unknown() -> Self {
        Self::new("Unknown", LabelStyle::on(Rgb::GREY))
    }
}

/// State of a status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    #[default]
    Off,
    On,
    Blinking,
    Error,
}

/// Status LED; a blinking LED toggles between green and off once a second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Led {
    state: LedState,
    lit: bool,
    toggled_at: Option<Instant>,
}

impl Led {
    pub const BLINK_PERIOD: Duration = Duration::from_secs(1);

    pub fn state(&self) -> LedState {
        self.state
    }

    pub fn set(&mut self, state: LedState) {
        if state != self.state {
            self.lit = true;
            self.toggled_at = None;
        }
        self.state = state;
    }

    /// Advance the blink phase.
    pub fn tick(&mut self, now: Instant) {
        if self.state != LedState::Blinking {
            return;
        }
        match self.toggled_at {
            None => self.toggled_at = Some(now),
            Some(at) if now.saturating_duration_since(at) >= Self::BLINK_PERIOD => {
                self.lit = !self.lit;
                self.toggled_at = Some(now);
            }
            Some(_) => {}
        }
    }

    /// Color to paint, `None` when dark.
    pub fn color(&self) -> Option<Rgb> {
        match self.state {
            LedState::Off => None,
            LedState::On => Some(Rgb::GREEN),
            LedState::Blinking => self.lit.then_some(Rgb::GREEN),
            LedState::Error => Some(Rgb::RED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_stripped() {
        assert_eq!(strip_unit(" 100 ms", "ms"), "100");
        assert_eq!(strip_unit("5.5 °C", "°C"), "5.5");
        assert_eq!(strip_unit("42", "ms"), "42");
    }

    #[test]
    fn blinking_led_toggles_every_second() {
        let t0 = Instant::now();
        let mut led = Led::default();
        assert_eq!(led.color(), None);
        led.set(LedState::Blinking);
        led.tick(t0);
        assert_eq!(led.color(), Some(Rgb::GREEN));
        led.tick(t0 + Duration::from_millis(500));
        assert_eq!(led.color(), Some(Rgb::GREEN));
        led.tick(t0 + Duration::from_millis(1000));
        assert_eq!(led.color(), None);
        led.tick(t0 + Duration::from_millis(2000));
        assert_eq!(led.color(), Some(Rgb::GREEN));

        led.set(LedState::Error);
        led.tick(t0 + Duration::from_millis(3000));
        assert_eq!(led.color(), Some(Rgb::RED));
    }
}
