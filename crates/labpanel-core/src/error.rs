//! Error types shared by every labpanel crate.
//!
//! Two layers exist:
//!
//! - [`BusError`] describes a failure reported by the device bus itself
//!   (connection, read, write, command, subscription, property access).
//!   It always names the device it came from.
//! - [`PanelError`] is the crate-wide error enum. It wraps `BusError` and
//!   adds the local failure modes: malformed user input, unsupported
//!   attribute configurations, configuration loading, file export, child
//!   process management and numerical analysis.
//!
//! Front-ends never display a `PanelError` directly. They convert it into a
//! [`UserError`], which carries the title and message of the modal dialog.

use thiserror::Error;

// =============================================================================
// Bus Errors
// =============================================================================

/// Category of a device-bus failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    /// Proxy creation or ping failed.
    Connection,
    /// The device did not answer in time. Event timeouts map here too.
    Timeout,
    /// Reading an attribute failed.
    Read,
    /// Writing an attribute failed.
    Write,
    /// Executing a command failed.
    Command,
    /// Subscribing to or unsubscribing from change events failed.
    Subscription,
    /// Reading or writing a configuration property failed.
    Property,
    /// The device, attribute, command or property does not exist.
    NotFound,
}

impl std::fmt::Display for BusErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BusErrorKind::Connection => "connection",
            BusErrorKind::Timeout => "timeout",
            BusErrorKind::Read => "read",
            BusErrorKind::Write => "write",
            BusErrorKind::Command => "command",
            BusErrorKind::Subscription => "subscription",
            BusErrorKind::Property => "property",
            BusErrorKind::NotFound => "not_found",
        };
        write!(f, "{}", label)
    }
}

/// Failure reported by the device bus for one device.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Device '{device}' {kind} error: {message}")]
pub struct BusError {
    /// Fully qualified device name (`domain/family/member`).
    pub device: String,
    /// Failure category.
    pub kind: BusErrorKind,
    /// Human readable description, shown as the dialog body.
    pub message: String,
}

impl BusError {
    /// Create a new bus error.
    pub fn new(device: impl Into<String>, kind: BusErrorKind, message: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`BusErrorKind::NotFound`] error.
    pub fn not_found(device: impl Into<String>, what: impl std::fmt::Display) -> Self {
        Self::new(device, BusErrorKind::NotFound, format!("{} not found", what))
    }
}

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, PanelError>;

/// Primary error type for labpanel.
#[derive(Error, Debug)]
pub enum PanelError {
    /// The device bus reported a failure.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A user supplied value could not be converted to the attribute type.
    #[error("Failed to convert value: {0}")]
    ValueConversion(String),

    /// A value was well formed but outside the accepted range.
    #[error("Bad value: {0}")]
    OutOfRange(String),

    /// The attribute or argument configuration has no supported representation.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// An action was requested that the current panel state forbids.
    #[error("{0}")]
    InvalidState(String),

    /// Configuration loading or extraction failed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration values parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing an export file failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Spawning or supervising a child process failed.
    #[error("Process error: {0}")]
    Process(String),

    /// A numerical routine rejected its input.
    #[error("Analysis error: {0}")]
    Analysis(String),
}

impl From<figment::Error> for PanelError {
    fn from(err: figment::Error) -> Self {
        PanelError::Config(Box::new(err))
    }
}

impl PanelError {
    /// Returns the bus error when this error originated from the device bus.
    pub fn as_bus(&self) -> Option<&BusError> {
        match self {
            PanelError::Bus(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// User-facing errors
// =============================================================================

/// Payload of a modal error dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub message: String,
}

impl UserError {
    /// Create a dialog payload.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Build a dialog from an error, using `title` for bus failures.
    ///
    /// Conversion failures always use the "Value error" title so that every
    /// malformed input is reported the same way.
    pub fn from_error(title: impl Into<String>, err: &PanelError) -> Self {
        match err {
            PanelError::ValueConversion(_) => {
                Self::new("Value error", "Failed to convert value")
            }
            PanelError::Bus(bus) => Self::new(title, bus.message.clone()),
            other => Self::new(title, other.to_string()),
        }
    }
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_error_display_names_device_and_kind() {
        let err = BusError::new("udyni/laser/cryo", BusErrorKind::Command, "interlock");
        assert_eq!(
            err.to_string(),
            "Device 'udyni/laser/cryo' command error: interlock"
        );
    }

    #[test]
    fn conversion_errors_map_to_value_error_dialog() {
        let err = PanelError::ValueConversion("abc".into());
        let dialog = UserError::from_error("Failed to set attribute", &err);
        assert_eq!(dialog.title, "Value error");
        assert_eq!(dialog.message, "Failed to convert value");
    }

    #[test]
    fn bus_errors_keep_the_device_description() {
        let err: PanelError =
            BusError::new("a/b/c", BusErrorKind::Write, "Position out of limits").into();
        let dialog = UserError::from_error("Failed to set attribute", &err);
        assert_eq!(dialog.title, "Failed to set attribute");
        assert_eq!(dialog.message, "Position out of limits");
        assert!(err.as_bus().is_some());
    }
}
