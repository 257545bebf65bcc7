//! Device command console.

use std::sync::Arc;

use clap::Parser;
use labpanel_egui::cli::ExecuterArgs;
use labpanel_egui::views::ExecuterView;
use labpanel_egui::{run, Environment};
use labpanel_panels::CommandExecuter;

fn main() -> anyhow::Result<()> {
    let args = ExecuterArgs::parse();
    let env = Environment::prepare(&args.common)?;
    let device = args.device;
    run("Command executer", env, move |env, _sink| {
        let console = CommandExecuter::new(Arc::clone(&env.bus));
        Ok(ExecuterView::new(console, device.as_deref()))
    })
}
