//! # labpanel-egui
//!
//! egui front-end of the laboratory panels. Every binary under `src/bin`
//! builds one controller from `labpanel-panels`, wraps it in a
//! [`views`] renderer and hands it to [`shell::run`], which owns the window,
//! the event bridge and the error dialogs.

pub mod cli;
pub mod shell;
pub mod views;
pub mod widgets;

pub use shell::{run, Dialogs, Environment, PanelView};
