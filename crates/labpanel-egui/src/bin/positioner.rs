//! SmarAct positioner channels.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::{run, Environment};
use labpanel_panels::PositionerPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Positioner", env, |env, sink| {
        PositionerPanel::open(Arc::clone(&env.bus), sink)
    })
}
