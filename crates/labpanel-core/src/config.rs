//! Layered panel configuration.
//!
//! Settings are resolved with `figment` in three layers, each overriding the
//! previous one:
//!
//! 1. [`PanelSettings::default()`]: the device names and timings of the
//!    laboratory installation.
//! 2. An optional TOML file (`config/labpanel.toml` unless a path is given).
//! 3. Environment variables prefixed with `LABPANEL_`. Nested fields use a
//!    double underscore, e.g. `LABPANEL_CAMERA__FRAME_INTERVAL_MS=250`.
//!
//! The merged settings are validated before they are returned.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, PanelError};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/labpanel.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LABPANEL_";

/// Device names used by the panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceNames {
    pub compressor: String,
    /// Optional temperature monitor shown by the compressor panel.
    pub temperature_monitor: String,
    pub cryostat: String,
    pub dry_pump: String,
    pub chiller: String,
    /// Valve operated by the "xuv" toggle button.
    pub valve_xuv: String,
    /// Valve operated by the "vmi" toggle button.
    pub valve_vmi: String,
    /// Valves whose state is shown by the cooling panel, with display labels.
    pub cooling_valves: Vec<(String, String)>,
    pub archive_extractor: String,
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self {
            compressor: "udyni/laser/compressor".into(),
            temperature_monitor: "udyni/monitoring/pitemp1".into(),
            cryostat: "udyni/laser/cryo".into(),
            dry_pump: "udyni/vacuum/mainpump01".into(),
            chiller: "udyni/cooling/chiller".into(),
            valve_xuv: "udyni/cooling/valve_14".into(),
            valve_vmi: "udyni/cooling/valve_15".into(),
            cooling_valves: vec![
                ("EVO 1".into(), "udyni/cooling/valve_11".into()),
                ("EVO 2".into(), "udyni/cooling/valve_10".into()),
                ("Cryostar".into(), "udyni/cooling/valve_12".into()),
                ("DryVac".into(), "udyni/cooling/valve_13".into()),
                ("TP XUV".into(), "udyni/cooling/valve_14".into()),
                ("TP VMI".into(), "udyni/cooling/valve_15".into()),
            ],
            archive_extractor: "archiving/hdb/hdbextractor.1".into(),
        }
    }
}

/// Laser camera settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Minimum interval between two processed frames of one attribute.
    pub frame_interval_ms: u64,
    /// Frame period of the synthetic camera.
    pub simulation_period_ms: u64,
    /// Device name used for references in simulation mode.
    pub simulator_device: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 500,
            simulation_period_ms: 500,
            simulator_device: "simulator".into(),
        }
    }
}

/// Spectrometer viewer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrometerSettings {
    /// Device classes searched for spectrometers.
    pub classes: Vec<String>,
    /// Minimum interval between two spectrum refreshes.
    pub refresh_interval_ms: u64,
    /// Initial directory of the export dialog.
    pub export_dir: PathBuf,
}

impl Default for SpectrometerSettings {
    fn default() -> Self {
        Self {
            classes: vec!["OOSpectrometer".into(), "AvantesSpectrometer".into()],
            refresh_interval_ms: 200,
            export_dir: PathBuf::from("."),
        }
    }
}

/// Archiving viewer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivingSettings {
    /// Total extraction attempts per attribute.
    pub attempts: u32,
    /// Pause between two attempts.
    pub retry_delay_ms: u64,
    /// Default smoothing window length.
    pub smoothing_window: usize,
}

impl Default for ArchivingSettings {
    fn default() -> Self {
        Self {
            attempts: 2,
            retry_delay_ms: 1000,
            smoothing_window: 11,
        }
    }
}

/// Dry pump panel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VacuumSettings {
    pub poll_interval_ms: u64,
    pub frequency_min: f64,
    pub frequency_max: f64,
}

impl Default for VacuumSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            frequency_min: 0.0,
            frequency_max: 120.0,
        }
    }
}

/// Simulated bus settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// JSON file with extra simulated devices.
    pub scenario: Option<PathBuf>,
    /// Seed of the synthetic readings and frames, random when unset.
    pub seed: Option<u64>,
}

/// Program launcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Program tree file.
    pub config: PathBuf,
    /// Time a new program gets before it counts as started.
    pub startup_grace_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config/launcher.toml"),
            startup_grace_ms: 500,
            poll_interval_ms: 1000,
        }
    }
}

/// Top-level configuration shared by every panel binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Default log level when `--debug` is not given.
    pub log_level: String,
    pub devices: DeviceNames,
    pub camera: CameraSettings,
    pub spectrometer: SpectrometerSettings,
    pub archiving: ArchivingSettings,
    pub vacuum: VacuumSettings,
    pub simulation: SimulationSettings,
    pub launcher: LauncherSettings,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            devices: DeviceNames::default(),
            camera: CameraSettings::default(),
            spectrometer: SpectrometerSettings::default(),
            archiving: ArchivingSettings::default(),
            vacuum: VacuumSettings::default(),
            simulation: SimulationSettings::default(),
            launcher: LauncherSettings::default(),
        }
    }
}

impl PanelSettings {
    /// Resolve defaults, the optional file and environment overrides.
    pub fn load(config_path: Option<&Path>) -> AppResult<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut figment = Figment::from(Serialized::defaults(PanelSettings::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(&path));
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: PanelSettings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks on merged values.
    pub fn validate(&self) -> AppResult<()> {
        const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(PanelError::Configuration(format!(
                "log_level must be one of {:?}, got '{}'",
                LEVELS, self.log_level
            )));
        }
        if self.archiving.attempts == 0 {
            return Err(PanelError::Configuration(
                "archiving.attempts must be at least 1".into(),
            ));
        }
        if self.vacuum.frequency_min > self.vacuum.frequency_max {
            return Err(PanelError::Configuration(
                "vacuum.frequency_min must not exceed vacuum.frequency_max".into(),
            ));
        }
        if self.camera.frame_interval_ms == 0 || self.camera.simulation_period_ms == 0 {
            return Err(PanelError::Configuration(
                "camera intervals must be positive".into(),
            ));
        }
        let named = [
            &self.devices.compressor,
            &self.devices.cryostat,
            &self.devices.dry_pump,
            &self.devices.archive_extractor,
        ];
        if named.iter().any(|name| name.trim().is_empty()) {
            return Err(PanelError::Configuration("device names must not be empty".into()));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.camera.frame_interval_ms)
    }

    pub fn spectrum_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.spectrometer.refresh_interval_ms)
    }

    pub fn archive_retry_delay(&self) -> Duration {
        Duration::from_millis(self.archiving.retry_delay_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.launcher.startup_grace_ms)
    }

    pub fn launcher_poll_interval(&self) -> Duration {
        Duration::from_millis(self.launcher.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PanelSettings::load(Some(&dir.path().join("missing.toml"))).unwrap();
        assert_eq!(settings, PanelSettings::default());
        assert_eq!(settings.frame_interval(), Duration::from_millis(500));
        assert_eq!(settings.devices.compressor, "udyni/laser/compressor");
    }

    #[test]
    #[serial]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n[camera]\nframe_interval_ms = 250\n[devices]\ncryostat = \"lab/cryo/2\""
        )
        .unwrap();
        let settings = PanelSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.camera.frame_interval_ms, 250);
        assert_eq!(settings.camera.simulation_period_ms, 500);
        assert_eq!(settings.devices.cryostat, "lab/cryo/2");
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        std::env::set_var("LABPANEL_ARCHIVING__RETRY_DELAY_MS", "5");
        let dir = tempfile::tempdir().unwrap();
        let settings = PanelSettings::load(Some(&dir.path().join("none.toml")));
        std::env::remove_var("LABPANEL_ARCHIVING__RETRY_DELAY_MS");
        assert_eq!(settings.unwrap().archiving.retry_delay_ms, 5);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut settings = PanelSettings::default();
        settings.log_level = "loud".into();
        assert!(matches!(settings.validate(), Err(PanelError::Configuration(_))));

        let mut settings = PanelSettings::default();
        settings.archiving.attempts = 0;
        assert!(settings.validate().is_err());
    }
}
