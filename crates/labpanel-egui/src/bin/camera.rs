//! Laser camera panel.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::CameraArgs;
use labpanel_egui::views::CameraView;
use labpanel_egui::{run, Environment};
use labpanel_panels::CameraPanel;

fn main() -> anyhow::Result<()> {
    let args = CameraArgs::parse();
    let env = Environment::prepare(&args.common)?;
    let simulation = args.simulation;
    run("Laser camera", env, move |env, sink| {
        CameraPanel::open(Arc::clone(&env.bus), &env.settings, simulation, sink).map(CameraView::new)
    })
}
