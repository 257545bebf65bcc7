//! Camera configuration window.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::SetupArgs;
use labpanel_egui::views::CameraSetupView;
use labpanel_egui::{run, Environment};
use labpanel_panels::CameraSetup;

fn main() -> anyhow::Result<()> {
    let args = SetupArgs::parse();
    let env = Environment::prepare(&args.common)?;
    let camera = args.camera;
    run("Camera setup", env, move |env, sink| {
        CameraSetup::open(Arc::clone(&env.bus), camera.as_deref(), sink).map(CameraSetupView::new)
    })
}
