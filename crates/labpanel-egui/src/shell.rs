//! Window harness shared by the panel binaries.
//!
//! [`run`] opens the native window, creates the [`EventBridge`] whose waker
//! repaints it, and builds the panel inside the window so that a failed
//! critical connection is shown as a dialog before the program exits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use eframe::egui;
use labpanel_core::bus::{ChangeEvent, DeviceBus};
use labpanel_core::error::UserError;
use labpanel_core::{logging, EventBridge, EventSink, PanelSettings};
use labpanel_sim::{Activity, Laboratory};

use crate::cli::Args;

/// Repaint cadence when no event arrives, for blinking LEDs and polls.
const IDLE_REPAINT: Duration = Duration::from_millis(200);

/// Settings and device bus of one panel process.
pub struct Environment {
    pub settings: PanelSettings,
    pub bus: Arc<dyn DeviceBus>,
    _activity: Activity,
}

impl Environment {
    /// Load the settings, install logging and bring up the simulated
    /// laboratory with its background activity.
    pub fn prepare(args: &Args) -> anyhow::Result<Self> {
        let loaded = PanelSettings::load(args.config.as_deref());
        let level = loaded
            .as_ref()
            .map(|s| s.log_level.clone())
            .unwrap_or_else(|_| "info".into());
        logging::init(args.debug, &level);
        let settings = loaded.context("Failed to load configuration")?;

        let lab = Laboratory::from_settings(&settings).context("Failed to build the laboratory")?;
        let activity = lab
            .start_activity()
            .context("Failed to start the simulated devices")?;
        tracing::info!(seed = ?settings.simulation.seed, "Device bus ready");
        let bus: Arc<dyn DeviceBus> = lab.bus();
        Ok(Self {
            settings,
            bus,
            _activity: activity,
        })
    }
}

/// Queue of error dialogs, shown one at a time.
#[derive(Debug, Default)]
pub struct Dialogs {
    queue: VecDeque<UserError>,
}

impl Dialogs {
    pub fn push(&mut self, error: UserError) {
        tracing::warn!(title = %error.title, "{}", error.message);
        self.queue.push_back(error);
    }

    /// Show the error of a failed action, pass the value of a successful one.
    pub fn report<T>(&mut self, result: Result<T, UserError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push(error);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Draw the front dialog. Returns true when it was dismissed this frame.
    pub fn show(&mut self, ctx: &egui::Context) -> bool {
        let Some(current) = self.queue.front() else {
            return false;
        };
        let mut dismissed = false;
        let response = egui::Modal::new(egui::Id::new("labpanel_error")).show(ctx, |ui| {
            ui.set_max_width(420.0);
            ui.heading(&current.title);
            ui.add_space(4.0);
            ui.label(&current.message);
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                dismissed = true;
            }
        });
        if dismissed || response.should_close() {
            self.queue.pop_front();
            return true;
        }
        false
    }
}

/// Rendering side of a panel.
pub trait PanelView {
    fn title(&self) -> String;

    fn handle_event(&mut self, event: &ChangeEvent);

    fn tick(&mut self, _now: Instant) {}

    fn ui(&mut self, ui: &mut egui::Ui, dialogs: &mut Dialogs);
}

struct PanelApp<V> {
    view: Option<V>,
    bridge: EventBridge,
    dialogs: Dialogs,
    titled: bool,
    _env: Environment,
}

impl<V: PanelView> eframe::App for PanelApp<V> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(view) = self.view.as_mut() {
            for event in self.bridge.drain() {
                view.handle_event(&event);
            }
            view.tick(Instant::now());
            if !self.titled {
                ctx.send_viewport_cmd(egui::ViewportCommand::Title(view.title()));
                self.titled = true;
            }
            egui::CentralPanel::default().show(ctx, |ui| view.ui(ui, &mut self.dialogs));
            ctx.request_repaint_after(IDLE_REPAINT);
        }

        // Without a panel the only thing left is the startup error.
        if self.dialogs.show(ctx) && self.view.is_none() && self.dialogs.is_empty() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

/// Open the window and run `build`'s panel until it is closed.
///
/// A `build` error is shown in a dialog and turned into a failure exit.
pub fn run<V, F>(name: &str, env: Environment, build: F) -> anyhow::Result<()>
where
    V: PanelView + 'static,
    F: FnOnce(&Environment, EventSink) -> Result<V, UserError> + 'static,
{
    tracing::info!(panel = name, "Starting panel");
    let failed = Arc::new(AtomicBool::new(false));
    let startup_failed = Arc::clone(&failed);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 640.0])
            .with_min_inner_size([360.0, 240.0])
            .with_title(name),
        ..Default::default()
    };

    eframe::run_native(
        name,
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let bridge = EventBridge::with_waker(Arc::new(move || ctx.request_repaint()));
            let mut dialogs = Dialogs::default();
            let view = match build(&env, bridge.sink()) {
                Ok(view) => Some(view),
                Err(error) => {
                    tracing::error!(title = %error.title, "{}", error.message);
                    startup_failed.store(true, Ordering::SeqCst);
                    dialogs.push(error);
                    None
                }
            };
            Ok(Box::new(PanelApp {
                view,
                bridge,
                dialogs,
                titled: false,
                _env: env,
            }))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Window failed: {}", e))?;

    if failed.load(Ordering::SeqCst) {
        anyhow::bail!("{} could not start", name);
    }
    tracing::info!(panel = name, "Panel closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_queues_failures_only() {
        let mut dialogs = Dialogs::default();
        assert_eq!(dialogs.report::<u8>(Ok(3)), Some(3));
        assert!(dialogs.is_empty());
        assert_eq!(dialogs.report::<u8>(Err(UserError::new("Oops", "broken"))), None);
        assert!(!dialogs.is_empty());
    }
}
