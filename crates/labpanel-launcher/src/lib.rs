//! # labpanel-launcher
//!
//! Program tree of the lab browser. A TOML file describes categories of
//! panel programs; [`LauncherTree`] starts them as detached children and
//! keeps their status current, including instances started elsewhere.

pub mod config;
pub mod process;
pub mod tree;

pub use config::{CategoryConfig, LauncherConfig, ProgramConfig};
pub use process::{ProcessInfo, Program, ProgramStatus};
pub use tree::{status_message, Category, LauncherTree, Node, COLUMNS};
