//! Program browser.

use clap::Parser;
use labpanel_core::error::UserError;
use labpanel_egui::cli::BrowserArgs;
use labpanel_egui::views::BrowserView;
use labpanel_egui::{run, Environment};
use labpanel_launcher::LauncherTree;

fn main() -> anyhow::Result<()> {
    let args = BrowserArgs::parse();
    let env = Environment::prepare(&args.common)?;
    let programs = args.programs;
    run("Program browser", env, move |env, _sink| {
        let settings = &env.settings;
        let path = programs.unwrap_or_else(|| settings.launcher.config.clone());
        let tree = LauncherTree::load(&path, settings.startup_grace()).map_err(|e| {
            UserError::new(
                "Failed to load programs",
                format!("{}: {}", path.display(), e),
            )
        })?;
        Ok(BrowserView::new(tree, settings.launcher_poll_interval()))
    })
}
