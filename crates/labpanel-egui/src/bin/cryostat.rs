//! Cryostat readings and compressor control.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::{run, Environment};
use labpanel_panels::CryostatPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Cryostat", env, |env, sink| {
        CryostatPanel::open(Arc::clone(&env.bus), &env.settings.devices, sink)
    })
}
