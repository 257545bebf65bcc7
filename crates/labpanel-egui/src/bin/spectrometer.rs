//! Spectrum viewer.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::views::SpectrometerView;
use labpanel_egui::{run, Environment};
use labpanel_panels::SpectrometerPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Spectrum viewer", env, |env, sink| {
        SpectrometerPanel::open(Arc::clone(&env.bus), &env.settings.spectrometer, sink)
            .map(SpectrometerView::new)
    })
}
