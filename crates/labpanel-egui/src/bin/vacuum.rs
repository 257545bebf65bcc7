//! Dry pump panel.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::{run, Environment};
use labpanel_panels::VacuumPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("DryVac", env, |env, sink| {
        VacuumPanel::open(
            Arc::clone(&env.bus),
            &env.settings.devices,
            &env.settings.vacuum,
            sink,
        )
    })
}
