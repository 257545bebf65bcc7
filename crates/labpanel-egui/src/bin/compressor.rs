//! Pulse compressor motor and temperature monitor.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::{run, Environment};
use labpanel_panels::CompressorPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Compressor", env, |env, sink| {
        CompressorPanel::open(Arc::clone(&env.bus), &env.settings.devices, sink)
    })
}
