//! Archived attribute viewer.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::Args;
use labpanel_egui::views::ArchivingView;
use labpanel_egui::{run, Environment};
use labpanel_panels::ArchivingPanel;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env = Environment::prepare(&args)?;
    run("Archiving viewer", env, |env, _sink| {
        let now = chrono::Local::now().naive_local();
        let settings = &env.settings;
        ArchivingPanel::open(Arc::clone(&env.bus), &settings.devices, &settings.archiving, now)
            .map(|panel| ArchivingView::new(panel, settings.archiving.smoothing_window))
    })
}
