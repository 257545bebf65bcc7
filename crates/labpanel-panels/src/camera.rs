//! Laser camera panel.
//!
//! Two image views and one projection view each show one image attribute of
//! the camera. Frames go through [`BeamTracker`], which drops frames arriving
//! faster than the configured interval and locates the beam when a view
//! tracks that attribute. Beam references are kept in a [`ReferenceStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use labpanel_analysis::image::profiles;
use labpanel_analysis::{fit_1d, BeamTracker, Centroid, Ellipse, FrameOutcome, Gauss1d};
use labpanel_core::attribute::AttrValue;
use labpanel_core::bus::{connect_checked, ChangeEvent, DeviceBus, DeviceProxy, SubscriptionId};
use labpanel_core::config::PanelSettings;
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::UserError;
use labpanel_core::reference::{Reference, ReferenceStore, REFERENCE_OBJECT};
use labpanel_sim::{FrameGenerator, SIMULATED_ATTRIBUTES};
use ndarray::{Array1, Array2};

use crate::common::{Panel, Subscriptions};

/// The three views of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Left,
    Right,
    Projection,
}

impl View {
    pub const ALL: [View; 3] = [View::Left, View::Right, View::Projection];

    pub fn name(self) -> &'static str {
        match self {
            View::Left => "Left",
            View::Right => "Right",
            View::Projection => "Projection",
        }
    }
}

/// The two plots of the projection view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Column means.
    Horizontal,
    /// Row means.
    Vertical,
}

/// Toggle buttons of a plot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlotOptions {
    pub tracking: bool,
    pub show_reference: bool,
    /// Mark the ellipse center instead of the moments centroid.
    pub swap: bool,
    /// Profiles only.
    pub autoscale: bool,
    /// Profiles only.
    pub gauss: bool,
}

/// Beam position drawn on a plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub ellipse: Option<Ellipse>,
}

/// Last processed frame of one attribute.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub image: Array2<f64>,
    pub centroid: Option<Centroid>,
    pub horizontal: Array1<f64>,
    pub vertical: Array1<f64>,
    pub horizontal_fit: Option<Gauss1d>,
    pub vertical_fit: Option<Gauss1d>,
}

/// Image attributes of a camera: names starting with `Image`, sorted.
pub fn image_attributes(attributes: &[String]) -> Vec<String> {
    let mut found: Vec<String> = attributes
        .iter()
        .filter(|a| a.starts_with("Image"))
        .cloned()
        .collect();
    found.sort();
    found
}

/// Attribute indices initially shown in the left, right and projection views.
pub fn default_selection(count: usize) -> [usize; 3] {
    match count {
        n if n > 2 => [1, 2, 1],
        2 => [1, 1, 1],
        _ => [0, 0, 0],
    }
}

/// Laser camera panel controller.
pub struct CameraPanel {
    bus: Arc<dyn DeviceBus>,
    sink: EventSink,
    device: Option<Arc<dyn DeviceProxy>>,
    device_name: String,
    simulation: bool,
    /// Selectable image attributes.
    pub attributes: Vec<String>,
    selection: HashMap<View, String>,
    left: PlotOptions,
    right: PlotOptions,
    horizontal: PlotOptions,
    vertical: PlotOptions,
    references: ReferenceStore,
    tracker: BeamTracker,
    frames: HashMap<String, FrameView>,
    subscribed: HashMap<String, Option<SubscriptionId>>,
    subscriptions: Subscriptions,
    generator: Option<FrameGenerator>,
}

impl CameraPanel {
    /// Connect to the camera named by the `LaserCamera/camera` property, or
    /// start the synthetic frame thread with `simulation`.
    pub fn open(
        bus: Arc<dyn DeviceBus>,
        settings: &PanelSettings,
        simulation: bool,
        sink: EventSink,
    ) -> Result<Self, UserError> {
        let (device, device_name, attributes) = if simulation {
            let attributes = SIMULATED_ATTRIBUTES.iter().map(|a| a.to_string()).collect();
            (None, settings.camera.simulator_device.clone(), attributes)
        } else {
            let device = Self::connect_camera(bus.as_ref())?;
            let attributes = device.attribute_list().map_err(|e| {
                UserError::new("Failed to connect to camera", e.message.clone())
            })?;
            let name = device.name().to_string();
            (Some(device), name, image_attributes(&attributes))
        };

        let references = ReferenceStore::load(bus.as_ref(), &device_name, &attributes)
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to load references");
                ReferenceStore::new(&device_name, &attributes)
            });

        let mut panel = Self {
            bus,
            sink,
            device,
            device_name,
            simulation,
            attributes,
            selection: HashMap::new(),
            left: PlotOptions::default(),
            right: PlotOptions::default(),
            horizontal: PlotOptions::default(),
            vertical: PlotOptions::default(),
            references,
            tracker: BeamTracker::new(settings.frame_interval()),
            frames: HashMap::new(),
            subscribed: HashMap::new(),
            subscriptions: Subscriptions::new(),
            generator: None,
        };
        for attr in &panel.attributes {
            panel.subscribed.insert(attr.to_lowercase(), None);
        }

        let indices = default_selection(panel.attributes.len());
        for (view, index) in View::ALL.into_iter().zip(indices) {
            if let Some(attr) = panel.attributes.get(index).cloned() {
                panel.select(view, &attr);
            }
        }

        if simulation {
            panel.start_simulation(
                Duration::from_millis(settings.camera.simulation_period_ms),
                settings.simulation.seed,
            )?;
        }
        Ok(panel)
    }

    fn connect_camera(bus: &dyn DeviceBus) -> Result<Arc<dyn DeviceProxy>, UserError> {
        let name = bus
            .get_property(REFERENCE_OBJECT, "camera")
            .ok()
            .and_then(|v| v.into_iter().next())
            .ok_or_else(|| {
                UserError::new("No camera", "No camera configured in the LaserCamera properties")
            })?;
        connect_checked(bus, &name).map_err(|e| {
            tracing::error!(device = %name, error = %e, "Failed to connect to camera");
            UserError::new("Failed to connect to camera", e.message)
        })
    }

    fn start_simulation(&mut self, period: Duration, seed: Option<u64>) -> Result<(), UserError> {
        let sink = self.sink.clone();
        let device = self.device_name.clone();
        let generator = FrameGenerator::spawn(self.attributes.clone(), period, seed, move |attr, frame| {
            sink.post(ChangeEvent::value(SubscriptionId(0), device.clone(), attr, AttrValue::Image(frame)));
        })
        .map_err(|e| UserError::new("Simulation failed", e.to_string()))?;
        self.generator = Some(generator);
        Ok(())
    }

    /// Device name used for the references.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    pub fn device(&self) -> Option<&Arc<dyn DeviceProxy>> {
        self.device.as_ref()
    }

    /// Attribute shown in `view`.
    pub fn selected(&self, view: View) -> Option<&str> {
        self.selection.get(&view).map(String::as_str)
    }

    /// Show `attribute` in `view`, subscribing it on first use.
    pub fn select(&mut self, view: View, attribute: &str) {
        self.selection.insert(view, attribute.to_string());
        let key = attribute.to_lowercase();
        if matches!(self.subscribed.get(&key), Some(Some(_))) {
            tracing::debug!(attribute, "Event already subscribed");
            return;
        }
        let Some(device) = &self.device else {
            return;
        };
        match self.subscriptions.subscribe(device, attribute, &self.sink) {
            Ok(id) => {
                self.subscribed.insert(key, Some(id));
            }
            Err(e) => tracing::error!(
                attribute,
                error = %e,
                "Failed to subscribe to events from attribute"
            ),
        }
    }

    /// Number of image attributes with a live subscription.
    pub fn subscription_count(&self) -> usize {
        self.subscribed.values().filter(|id| id.is_some()).count()
    }

    pub fn options(&self, view: View, profile: Profile) -> PlotOptions {
        *self.options_ref(view, profile)
    }

    /// Toggles of a plot. Image views ignore `profile`.
    pub fn options_mut(&mut self, view: View, profile: Profile) -> &mut PlotOptions {
        match (view, profile) {
            (View::Left, _) => &mut self.left,
            (View::Right, _) => &mut self.right,
            (View::Projection, Profile::Horizontal) => &mut self.horizontal,
            (View::Projection, Profile::Vertical) => &mut self.vertical,
        }
    }

    fn options_ref(&self, view: View, profile: Profile) -> &PlotOptions {
        match (view, profile) {
            (View::Left, _) => &self.left,
            (View::Right, _) => &self.right,
            (View::Projection, Profile::Horizontal) => &self.horizontal,
            (View::Projection, Profile::Vertical) => &self.vertical,
        }
    }

    fn shown_in(&self, view: View, attribute: &str) -> bool {
        self.selected(view)
            .is_some_and(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Some view showing `attribute` tracks the beam.
    pub fn is_tracked(&self, attribute: &str) -> bool {
        (self.shown_in(View::Left, attribute) && self.left.tracking)
            || (self.shown_in(View::Right, attribute) && self.right.tracking)
            || (self.shown_in(View::Projection, attribute)
                && (self.horizontal.tracking || self.vertical.tracking))
    }

    /// Last centroid found on `attribute`.
    pub fn last_centroid(&self, attribute: &str) -> Option<Centroid> {
        self.tracker.last_centroid(attribute)
    }

    /// Last processed frame of the attribute shown in `view`.
    pub fn frame(&self, view: View) -> Option<&FrameView> {
        self.selected(view)
            .and_then(|a| self.frames.get(&a.to_lowercase()))
    }

    /// Beam marker of an image view.
    pub fn marker(&self, view: View) -> Option<Marker> {
        let options = self.options_ref(view, Profile::Horizontal);
        if !options.tracking {
            return None;
        }
        let centroid = self.frame(view)?.centroid?;
        Some(if options.swap {
            Marker {
                x: centroid.ellipse.x,
                y: centroid.ellipse.y,
                ellipse: Some(centroid.ellipse),
            }
        } else {
            Marker {
                x: centroid.x,
                y: centroid.y,
                ellipse: None,
            }
        })
    }

    /// Beam position on a profile plot.
    pub fn profile_marker(&self, profile: Profile) -> Option<f64> {
        let options = self.options_ref(View::Projection, profile);
        if !options.tracking {
            return None;
        }
        let c = self.frame(View::Projection)?.centroid?;
        Some(match (profile, options.swap) {
            (Profile::Horizontal, false) => c.x,
            (Profile::Horizontal, true) => c.ellipse.x,
            (Profile::Vertical, false) => c.y,
            (Profile::Vertical, true) => c.ellipse.y,
        })
    }

    /// Profile data of the projection view.
    pub fn profile(&self, profile: Profile) -> Option<&Array1<f64>> {
        let frame = self.frame(View::Projection)?;
        Some(match profile {
            Profile::Horizontal => &frame.horizontal,
            Profile::Vertical => &frame.vertical,
        })
    }

    /// Gaussian fit of a profile, when enabled.
    pub fn profile_fit(&self, profile: Profile) -> Option<Gauss1d> {
        if !self.options_ref(View::Projection, profile).gauss {
            return None;
        }
        let frame = self.frame(View::Projection)?;
        match profile {
            Profile::Horizontal => frame.horizontal_fit,
            Profile::Vertical => frame.vertical_fit,
        }
    }

    /// Vertical range of an autoscaled profile plot.
    pub fn profile_range(&self, profile: Profile) -> Option<(f64, f64)> {
        if !self.options_ref(View::Projection, profile).autoscale {
            return None;
        }
        let data = self.profile(profile)?;
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min <= max).then_some((min, max))
    }

    /// Reference drawn on `view`, when enabled.
    pub fn reference_marker(&self, view: View, profile: Profile) -> Option<Reference> {
        if !self.options_ref(view, profile).show_reference {
            return None;
        }
        self.references.get(self.selected(view)?)
    }

    pub fn references(&self) -> &ReferenceStore {
        &self.references
    }

    pub fn set_reference(&mut self, attribute: &str, reference: Option<Reference>) {
        self.references.set(attribute, reference);
    }

    /// Persist the references. In simulation they are only logged.
    pub fn save_references(&self) -> Result<(), UserError> {
        self.references
            .save(self.bus.as_ref(), self.simulation)
            .map_err(|e| UserError::new("Failed to save references", format!("Error: {}", e)))
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        if self.simulation {
            event.device == self.device_name
        } else {
            self.subscriptions.owns(event)
        }
    }

    fn process_frame(&mut self, attribute: &str, image: &Array2<f64>) {
        let tracking = self.is_tracked(attribute);
        let centroid = match self.tracker.process(attribute, image, tracking) {
            FrameOutcome::Dropped => return,
            FrameOutcome::Shown => None,
            FrameOutcome::Tracked(centroid) => {
                if centroid.is_none() {
                    tracing::error!(attribute, "Failed to find a centroid");
                }
                centroid
            }
        };
        let Some((horizontal, vertical)) = profiles(image) else {
            return;
        };
        let projected = self.shown_in(View::Projection, attribute);
        let fit = |profile: &Array1<f64>, enabled: bool| -> Option<Gauss1d> {
            if !(projected && enabled) {
                return None;
            }
            let x = Array1::from_iter((0..profile.len()).map(|i| i as f64));
            fit_1d(x.view(), profile.view()).map(|f| f.params)
        };
        let horizontal_fit = fit(&horizontal, self.horizontal.gauss);
        let vertical_fit = fit(&vertical, self.vertical.gauss);
        self.frames.insert(
            attribute.to_lowercase(),
            FrameView {
                image: image.clone(),
                centroid,
                horizontal,
                vertical,
                horizontal_fit,
                vertical_fit,
            },
        );
    }

    /// Stop the synthetic frame thread.
    pub fn shutdown(&mut self) {
        if let Some(mut generator) = self.generator.take() {
            generator.stop();
        }
        self.subscriptions.clear();
    }
}

impl Panel for CameraPanel {
    fn title(&self) -> &str {
        "Laser camera"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        if !self.accepts(event) {
            return;
        }
        if let Some(err) = &event.error {
            tracing::error!(attribute = %event.attribute, reason = %err.reason, "{}", err.description);
            return;
        }
        let Some(image) = event.value.as_ref().and_then(AttrValue::as_image) else {
            return;
        };
        let shown = View::ALL.iter().any(|v| self.shown_in(*v, &event.attribute));
        if shown {
            self.process_frame(&event.attribute, image);
        }
    }
}

impl Drop for CameraPanel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
