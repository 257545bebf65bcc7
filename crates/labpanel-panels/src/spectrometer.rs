//! Spectrometer viewer.
//!
//! Finds the live spectrometers of the configured classes, shows the
//! selected one's spectrum with its FWHM, edits its acquisition settings and
//! exports the displayed spectrum.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use labpanel_analysis::{fwhm_bounds, RateLimiter};
use labpanel_core::attribute::{AttrValue, DevState, LabelStyle, Rgb};
use labpanel_core::bus::{live_devices_by_class, ChangeEvent, DeviceBus, DeviceProxy};
use labpanel_core::config::SpectrometerSettings;
use labpanel_core::dispatch::EventSink;
use labpanel_core::error::{BusError, UserError};
use labpanel_core::format::format_fixed;
use labpanel_storage::{ExportFormat, SpectrumMetadata, SpectrumRecord};
use ndarray::ArrayView1;

use crate::common::{strip_unit, Panel, StatusText, Subscriptions};

const BASE_ATTRIBUTES: [&str; 8] = [
    "BoxcarWidth",
    "enableBackgroundSubtraction",
    "enableElectricalDarkCorrection",
    "enableNLCorrection",
    "IntegrationTime",
    "ScansToAverage",
    "Spectrum",
    "State",
];
const TEC_ATTRIBUTES: [&str; 3] = ["EnableTEC", "TECSetPoint", "TECTemperature"];
const SET_FAILED: &str = "Failed to set value";

/// Status label of a spectrometer state.
pub fn status_label(state: Option<DevState>) -> StatusText {
    match state {
        Some(DevState::On | DevState::Running) => {
            StatusText::new("Running", LabelStyle::new(Rgb::DARK_GREEN, Rgb::WHITE))
        }
        Some(DevState::Off | DevState::Standby) => StatusText::new("Offline", LabelStyle::on(Rgb::WHITE)),
        Some(DevState::Fault | DevState::Alarm) => fault_label(),
        _ => StatusText::new("Unknown", LabelStyle::new(Rgb::RED, Rgb::WHITE)),
    }
}

fn fault_label() -> StatusText {
    StatusText::new("Fault", LabelStyle::new(Rgb::RED, Rgb::WHITE))
}

/// Spectrometers of `classes` that answer a ping.
pub fn discover(bus: &dyn DeviceBus, classes: &[String]) -> Vec<String> {
    let mut devices = Vec::new();
    for class in classes {
        match live_devices_by_class(bus, class) {
            Ok(found) => devices.extend(found),
            Err(e) => tracing::error!(class = %class, error = %e, "Failed to get the list of spectrometers"),
        }
    }
    devices
}

/// Text fields that stop following device events while edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    BoxcarWidth,
    ScansToAverage,
    IntegrationTime,
    TecSetPoint,
}

/// Wavelength markers placed on the plot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Markers {
    pub first: Option<f64>,
    pub second: Option<f64>,
    /// Second (delta) cursor allowed.
    pub delta: bool,
}

impl Markers {
    /// Place a marker, or move the nearest one once all are placed.
    pub fn click(&mut self, x: f64) {
        match (self.first, self.second) {
            (None, _) => self.first = Some(x),
            (Some(_), None) if self.delta => self.second = Some(x),
            (Some(a), Some(b)) if (x - a).abs() > (x - b).abs() => self.second = Some(x),
            (Some(_), _) => self.first = Some(x),
        }
    }

    pub fn set_delta(&mut self, enabled: bool) {
        self.delta = enabled;
        if !enabled {
            self.second = None;
        }
    }

    /// Cursor readout: the marker position, or the distance of two markers.
    pub fn text(&self) -> String {
        match (self.first, self.second) {
            (Some(a), Some(b)) => format!("\u{0394} {:.1} nm", (a - b).abs()),
            (Some(a), None) => format!("{:.1} nm", a),
            _ => String::new(),
        }
    }
}

struct Opened {
    proxy: Arc<dyn DeviceProxy>,
    tec: bool,
}

/// Spectrometer viewer controller.
pub struct SpectrometerPanel {
    bus: Arc<dyn DeviceBus>,
    sink: EventSink,
    classes: Vec<String>,
    /// Selectable spectrometers.
    pub devices: Vec<String>,
    opened: Option<Opened>,
    pub model: String,
    pub serial: String,
    pub wavelength: Vec<f64>,
    /// Displayed spectrum.
    pub spectrum: Vec<f64>,
    /// Half-height crossings of the displayed spectrum.
    pub fwhm: (f64, f64),
    /// FWHM readout, `{:.1}`.
    pub bandwidth: String,
    pub boxcar_width: String,
    pub scans_to_average: String,
    /// Integration time, `{:.2} ms`.
    pub integration_time: String,
    pub background_subtraction: bool,
    pub dark_correction: bool,
    pub nl_correction: bool,
    pub tec_enabled: bool,
    /// TEC set-point, `{:.1} °C`.
    pub tec_setpoint: String,
    /// TEC temperature, `{:.1} °C`, `N.A.` without TEC.
    pub tec_temperature: String,
    pub status: StatusText,
    /// Stored copies of earlier spectra.
    pub overlays: Vec<Vec<f64>>,
    pub markers: Markers,
    device_state: Option<DevState>,
    focus: Option<EditField>,
    limiter: RateLimiter,
    subscriptions: Subscriptions,
}

impl SpectrometerPanel {
    /// Discover spectrometers and open the first one.
    pub fn open(
        bus: Arc<dyn DeviceBus>,
        settings: &SpectrometerSettings,
        sink: EventSink,
    ) -> Result<Self, UserError> {
        let devices = discover(bus.as_ref(), &settings.classes);
        if devices.is_empty() {
            return Err(UserError::new("No spectrometer found", "No spectrometer found"));
        }
        let refresh = std::time::Duration::from_millis(settings.refresh_interval_ms);
        let mut panel = Self {
            bus,
            sink,
            classes: settings.classes.clone(),
            devices,
            opened: None,
            model: String::new(),
            serial: String::new(),
            wavelength: Vec::new(),
            spectrum: Vec::new(),
            fwhm: (f64::NAN, f64::NAN),
            bandwidth: String::new(),
            boxcar_width: String::new(),
            scans_to_average: String::new(),
            integration_time: String::new(),
            background_subtraction: false,
            dark_correction: false,
            nl_correction: false,
            tec_enabled: false,
            tec_setpoint: String::new(),
            tec_temperature: String::new(),
            status: StatusText::unknown(),
            overlays: Vec::new(),
            markers: Markers::default(),
            device_state: None,
            focus: None,
            limiter: RateLimiter::new(refresh),
            subscriptions: Subscriptions::new(),
        };
        let first = panel.devices[0].clone();
        panel.select(&first);
        Ok(panel)
    }

    /// Name of the open spectrometer.
    pub fn current_device(&self) -> Option<&str> {
        self.opened.as_ref().map(|o| o.proxy.name())
    }

    /// The open spectrometer has a thermo-electric cooler.
    pub fn has_tec(&self) -> bool {
        self.opened.as_ref().is_some_and(|o| o.tec)
    }

    /// Open another spectrometer. Failures are logged and leave none open.
    pub fn select(&mut self, device: &str) {
        self.close();
        if let Err(e) = self.open_device(device) {
            tracing::error!(device, error = %e, "Failed to open spectrometer");
            self.close();
        }
    }

    /// Rebuild the device list, keeping the current selection when it is
    /// still there.
    pub fn rescan(&mut self) {
        let current = self.current_device().map(str::to_string);
        tracing::info!(current = ?current, "Rescanning spectrometers");
        self.close();
        self.devices = discover(self.bus.as_ref(), &self.classes);
        let target = current
            .filter(|c| self.devices.contains(c))
            .or_else(|| self.devices.first().cloned());
        if let Some(device) = target {
            self.select(&device);
        }
    }

    fn close(&mut self) {
        self.subscriptions.clear();
        self.opened = None;
        self.spectrum.clear();
        self.overlays.clear();
        self.markers = Markers::default();
        self.limiter.reset("Spectrum");
    }

    fn open_device(&mut self, device: &str) -> Result<(), BusError> {
        tracing::info!(device, "Opening spectrometer");
        let proxy = labpanel_core::bus::connect_checked(self.bus.as_ref(), device)?;
        self.wavelength = proxy
            .read_attribute("Wavelength")?
            .as_spectrum()
            .map(<[f64]>::to_vec)
            .unwrap_or_default();
        self.model = proxy.read_attribute("Model")?.to_string();
        self.serial = proxy.read_attribute("SerialNumber")?.to_string();

        let tec = proxy
            .attribute_list()?
            .iter()
            .any(|a| a.eq_ignore_ascii_case("EnableTEC"));
        if tec {
            self.tec_setpoint.clear();
        } else {
            self.tec_enabled = false;
            self.tec_temperature = "N.A.".to_string();
            self.tec_setpoint.clear();
        }
        self.opened = Some(Opened {
            proxy: Arc::clone(&proxy),
            tec,
        });
        self.subscriptions.subscribe_all(&proxy, &BASE_ATTRIBUTES, &self.sink)?;
        if tec {
            self.subscriptions.subscribe_all(&proxy, &TEC_ATTRIBUTES, &self.sink)?;
        }
        Ok(())
    }

    /// The text field being edited, if any.
    pub fn set_focus(&mut self, field: Option<EditField>) {
        self.focus = field;
    }

    fn focused(&self, field: EditField) -> bool {
        self.focus == Some(field)
    }

    /// Device accepting settings: open and not in fault.
    fn writable(&self) -> Option<Arc<dyn DeviceProxy>> {
        match &self.opened {
            Some(_) if self.device_state == Some(DevState::Fault) => {
                tracing::debug!("Ignoring setting while the spectrometer is in fault");
                None
            }
            Some(o) => Some(Arc::clone(&o.proxy)),
            None => None,
        }
    }

    fn write(&self, attribute: &str, value: AttrValue, what: &str) -> Result<(), UserError> {
        let Some(proxy) = self.writable() else {
            return Ok(());
        };
        proxy.write_attribute(attribute, value).map_err(|e| {
            UserError::new(SET_FAILED, format!("Failed to set the {} (Error: {})", what, e.message))
        })
    }

    fn parse<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, UserError>
    where
        T::Err: std::fmt::Display,
    {
        text.trim().parse().map_err(|e: T::Err| {
            UserError::new("Bad value", format!("Failed to set the {} (Error: {})", what, e))
        })
    }

    pub fn set_scans_to_average(&mut self, text: &str) -> Result<(), UserError> {
        const WHAT: &str = "number of scans to average";
        if self.writable().is_none() {
            return Ok(());
        }
        let value: i64 = Self::parse(text, WHAT)?;
        self.write("ScansToAverage", AttrValue::Int(value), WHAT)
    }

    pub fn set_boxcar_width(&mut self, text: &str) -> Result<(), UserError> {
        const WHAT: &str = "boxcar width";
        if self.writable().is_none() {
            return Ok(());
        }
        let value: i64 = Self::parse(text, WHAT)?;
        self.write("BoxcarWidth", AttrValue::Int(value), WHAT)
    }

    /// Integration time in ms; a trailing `ms` is accepted.
    pub fn set_integration_time(&mut self, text: &str) -> Result<(), UserError> {
        const WHAT: &str = "integration time";
        if self.writable().is_none() {
            return Ok(());
        }
        let value: f64 = Self::parse(strip_unit(text, "ms"), WHAT)?;
        self.write("IntegrationTime", AttrValue::Float(value), WHAT)
    }

    /// TEC set-point in °C; a trailing `°C` is accepted.
    pub fn set_tec_setpoint(&mut self, text: &str) -> Result<(), UserError> {
        const WHAT: &str = "TEC set point";
        if self.writable().is_none() || !self.has_tec() {
            return Ok(());
        }
        let value: f64 = Self::parse(strip_unit(text, "°C"), WHAT)?;
        self.write("TECSetPoint", AttrValue::Float(value), WHAT)
    }

    pub fn set_dark_correction(&mut self, enabled: bool) -> Result<(), UserError> {
        let result = self.write("enableElectricalDarkCorrection", AttrValue::Bool(enabled), "dark correction");
        Self::apply_flag(&mut self.dark_correction, enabled, result)
    }

    pub fn set_nl_correction(&mut self, enabled: bool) -> Result<(), UserError> {
        let result = self.write("enableNLCorrection", AttrValue::Bool(enabled), "NL correction");
        Self::apply_flag(&mut self.nl_correction, enabled, result)
    }

    pub fn set_background_subtraction(&mut self, enabled: bool) -> Result<(), UserError> {
        let result = self.write(
            "enableBackgroundSubtraction",
            AttrValue::Bool(enabled),
            "background subtraction",
        );
        Self::apply_flag(&mut self.background_subtraction, enabled, result)
    }

    pub fn set_tec(&mut self, enabled: bool) -> Result<(), UserError> {
        if !self.has_tec() {
            return Ok(());
        }
        let result = self.write("EnableTEC", AttrValue::Bool(enabled), "TEC");
        Self::apply_flag(&mut self.tec_enabled, enabled, result)
    }

    /// Show the requested check state, or keep the previous one on failure.
    fn apply_flag(flag: &mut bool, enabled: bool, result: Result<(), UserError>) -> Result<(), UserError> {
        if result.is_ok() {
            *flag = enabled;
        }
        result
    }

    pub fn store_background(&mut self) -> Result<(), UserError> {
        let Some(proxy) = self.writable() else {
            return Ok(());
        };
        proxy.command("storeBackground", None).map(|_| ()).map_err(|e| {
            UserError::new(
                "Failed to store background",
                format!("Failed to store the background spectrum (Error: {})", e.message),
            )
        })
    }

    /// Keep a copy of the displayed spectrum on the plot.
    pub fn add_overlay(&mut self) {
        if !self.spectrum.is_empty() {
            self.overlays.push(self.spectrum.clone());
        }
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
    }

    /// Write the displayed spectrum to `path`.
    ///
    /// Returns `Ok(None)` without writing when no spectrometer is open, the
    /// device is in fault or nothing has been displayed yet.
    pub fn export(&self, format: ExportFormat, path: &Path) -> Result<Option<PathBuf>, UserError> {
        let Some(opened) = &self.opened else {
            return Ok(None);
        };
        let proxy = opened.proxy.as_ref();
        let failed = |e: &dyn std::fmt::Display| UserError::new("Export failed", e.to_string());
        let state = proxy.read_attribute("State").map_err(|e| failed(&e))?;
        if state.as_state() == Some(DevState::Fault) || self.spectrum.is_empty() {
            return Ok(None);
        }
        let metadata = self.metadata(proxy).map_err(|e| failed(&e))?;
        let record = SpectrumRecord::new(self.wavelength.clone(), self.spectrum.clone(), metadata);
        labpanel_storage::export(format, path, &record)
            .map(Some)
            .map_err(|e| failed(&e))
    }

    fn metadata(&self, proxy: &dyn DeviceProxy) -> Result<SpectrumMetadata, BusError> {
        let int = |attr: &str| -> Result<i64, BusError> {
            Ok(proxy.read_attribute(attr)?.as_i64().unwrap_or_default())
        };
        let flag = |attr: &str| -> Result<bool, BusError> {
            Ok(proxy.read_attribute(attr)?.as_bool().unwrap_or_default())
        };
        Ok(SpectrumMetadata {
            model: self.model.clone(),
            serial: self.serial.clone(),
            boxcar_width: int("BoxcarWidth")?,
            averages: int("ScansToAverage")?,
            integration_time: proxy
                .read_attribute("IntegrationTime")?
                .as_f64()
                .unwrap_or_default(),
            dark_correction: flag("enableElectricalDarkCorrection")?,
            nl_correction: flag("enableNLCorrection")?,
        })
    }

    fn show_spectrum(&mut self, spectrum: &[f64]) {
        if !self.limiter.accept("Spectrum") {
            return;
        }
        self.spectrum = spectrum.to_vec();
        self.fwhm = if self.wavelength.len() == spectrum.len() {
            fwhm_bounds(ArrayView1::from(&self.wavelength[..]), ArrayView1::from(spectrum))
        } else {
            (f64::NAN, f64::NAN)
        };
        self.bandwidth = format_fixed(self.fwhm.1 - self.fwhm.0, 1);
    }
}

impl Panel for SpectrometerPanel {
    fn title(&self) -> &str {
        "Spectrum viewer"
    }

    fn handle_event(&mut self, event: &ChangeEvent) {
        if !self.subscriptions.owns(event) {
            return;
        }
        if let Some(err) = &event.error {
            tracing::error!(attribute = %event.attribute, reason = %err.reason, "{}", err.description);
            self.status = fault_label();
            return;
        }
        let Some(value) = &event.value else { return };
        let int_text = |v: &AttrValue| v.as_i64().map(|i| i.to_string()).unwrap_or_default();
        match event.attribute.to_lowercase().as_str() {
            "boxcarwidth" if !self.focused(EditField::BoxcarWidth) => self.boxcar_width = int_text(value),
            "scanstoaverage" if !self.focused(EditField::ScansToAverage) => {
                self.scans_to_average = int_text(value)
            }
            "integrationtime" if !self.focused(EditField::IntegrationTime) => {
                self.integration_time = format!("{:.2} ms", value.as_f64().unwrap_or_default())
            }
            "tecsetpoint" if !self.focused(EditField::TecSetPoint) => {
                self.tec_setpoint = format!("{:.1} °C", value.as_f64().unwrap_or_default())
            }
            "tectemperature" => {
                self.tec_temperature = format!("{:.1} °C", value.as_f64().unwrap_or_default())
            }
            "enablebackgroundsubtraction" => self.background_subtraction = value.as_bool().unwrap_or_default(),
            "enableelectricaldarkcorrection" => self.dark_correction = value.as_bool().unwrap_or_default(),
            "enablenlcorrection" => self.nl_correction = value.as_bool().unwrap_or_default(),
            "enabletec" => self.tec_enabled = value.as_bool().unwrap_or_default(),
            "spectrum" => {
                if let Some(s) = value.as_spectrum() {
                    self.show_spectrum(s);
                }
            }
            "state" => {
                self.device_state = value.as_state();
                self.status = status_label(self.device_state);
            }
            "boxcarwidth" | "scanstoaverage" | "integrationtime" | "tecsetpoint" => {}
            _ => tracing::warn!(attribute = %event.attribute, "Got an unexpected event"),
        }
    }
}
