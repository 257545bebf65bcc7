//! # labpanel-panels
//!
//! Headless controllers of the laboratory panels. Each controller owns its
//! device proxies and subscriptions, exposes its display state as plain
//! fields, and reports failures as [`UserError`](labpanel_core::UserError)
//! values for the front-end to show.
//!
//! Change events reach a controller through [`Panel::handle_event`] on the
//! UI thread, after crossing an [`EventBridge`](labpanel_core::EventBridge).
//!
//! | module | panel |
//! |---|---|
//! | [`compressor`] | pulse compressor motor and temperature monitor |
//! | [`cryostat`] | cryostat readings and compressor control |
//! | [`vacuum`] | dry pump |
//! | [`cooling`] | cooling water valves and chiller |
//! | [`positioner`] | SmarAct positioner channels |
//! | [`spectrometer`] | spectrum viewer and export |
//! | [`camera`] | laser camera views and beam tracking |
//! | [`review`] | beam reference review |
//! | [`camera_setup`] | camera configuration |
//! | [`archiving`] | archived attribute history |
//! | [`executer`] | device command console |

pub mod archiving;
pub mod camera;
pub mod camera_setup;
pub mod common;
pub mod compressor;
pub mod cooling;
pub mod cryostat;
pub mod executer;
pub mod positioner;
pub mod review;
pub mod spectrometer;
pub mod vacuum;

pub use archiving::ArchivingPanel;
pub use camera::CameraPanel;
pub use camera_setup::CameraSetup;
pub use common::Panel;
pub use compressor::CompressorPanel;
pub use cooling::CoolingPanel;
pub use cryostat::CryostatPanel;
pub use executer::CommandExecuter;
pub use positioner::PositionerPanel;
pub use review::ReviewSession;
pub use spectrometer::SpectrometerPanel;
pub use vacuum::VacuumPanel;
