//! # labpanel-sim
//!
//! In-memory implementation of the device bus.
//!
//! [`SimBus`] and [`SimDevice`] implement the `labpanel-core` bus traits
//! without a network. Devices can be taken offline, made to fail a given
//! number of operations and driven from tests through
//! [`SimDevice::set_value`]. [`Laboratory`] assembles the devices used by the
//! panels so every panel binary can run with `--simulation`.

pub mod bus;
pub mod device;
pub mod frames;
pub mod presets;
pub mod rng;
pub mod scenario;
pub mod ticker;

pub use bus::SimBus;
pub use device::{CommandHandler, DeviceBuilder, Operation, SimDevice};
pub use frames::{synthetic_frame, FrameGenerator, SIMULATED_ATTRIBUTES};
pub use presets::{Activity, Laboratory, CAMERA_DEVICE};
pub use rng::SimRng;
pub use scenario::Scenario;
pub use ticker::Ticker;
