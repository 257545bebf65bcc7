//! # labpanel-core
//!
//! Shared foundation of the labpanel control panels.
//!
//! - [`attribute`]: attribute metadata, values and the device state table
//! - [`format`]: printf-style display formats
//! - [`bus`]: device-bus traits and change events
//! - [`dispatch`]: the bridge carrying change events to the UI thread
//! - [`widget`]: the generic attribute widget and its edit protocol
//! - [`convert`]: parsing of user-typed values and command arguments
//! - [`reference`]: beam reference encoding and persistence
//! - [`config`]: layered settings
//! - [`logging`]: subscriber bootstrap
//! - [`error`]: error types
//!
//! Panels are built on top of these pieces in `labpanel-panels`; the
//! simulated bus lives in `labpanel-sim`.

pub mod attribute;
pub mod bus;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod logging;
pub mod reference;
pub mod widget;

pub use attribute::{
    AttrValue, AttributeDescriptor, DataFormat, DataType, DevState, LabelStyle, Rgb, WriteMode,
};
pub use bus::{
    ArgType, ChangeEvent, CommandInfo, DeviceBus, DeviceProxy, EventCallback, EventError,
    SubscriptionId,
};
pub use config::PanelSettings;
pub use dispatch::{EventBridge, EventSink};
pub use error::{AppResult, BusError, BusErrorKind, PanelError, UserError};
pub use reference::{Reference, ReferenceStore};
pub use widget::{AttributeWidget, Control, TextStyle, WidgetKind};
