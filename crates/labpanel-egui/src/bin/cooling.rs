//! Cooling water valves and chiller.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::{run, Environment};
use labpanel_panels::CoolingPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Cooling", env, |env, sink| {
        CoolingPanel::open(Arc::clone(&env.bus), &env.settings.devices, sink)
    })
}
