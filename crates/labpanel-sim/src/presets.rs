//! Simulated laboratory.
//!
//! [`Laboratory::new`] registers one simulated device for every device name
//! in [`PanelSettings`], with the attributes, properties and commands the
//! panels use. [`Laboratory::start_activity`] adds background threads that
//! make readings drift and push camera frames.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use labpanel_core::attribute::{
    AttrValue, AttributeDescriptor, DataFormat, DataType, DevState,
};
use labpanel_core::bus::{ArgType, CommandInfo};
use labpanel_core::config::PanelSettings;
use labpanel_core::error::{AppResult, BusError, BusErrorKind};
use labpanel_core::reference::REFERENCE_OBJECT;

use crate::bus::SimBus;
use crate::scenario::Scenario;
use crate::device::{CommandHandler, SimDevice};
use crate::frames::{synthetic_frame, FrameGenerator, SIMULATED_ATTRIBUTES};
use crate::rng::SimRng;
use crate::ticker::Ticker;

/// Camera device advertised through the `LaserCamera` free property.
pub const CAMERA_DEVICE: &str = "udyni/laser/camera";
/// SmarAct positioner class.
pub const POSITIONER_CLASS: &str = "SmarActPositioner";
/// Archive extraction time format.
pub const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Attributes recorded by the simulated archive.
pub const ARCHIVED_ATTRIBUTES: [&str; 5] = [
    "udyni/laser/cryo/pressure",
    "udyni/laser/cryo/temperature",
    "udyni/cooling/chiller/temperature",
    "udyni/vacuum/mainpump01/pressure",
    "udyni/vacuum/mainpump01/temperature",
];

/// Temperature monitor channels, reported in kelvin.
pub const MONITOR_CHANNELS: [&str; 8] = [
    "RP_SxDown", "RP_DxDown", "RP_SxUp", "RP_AMB", "RP_DxUp", "RG_Dx", "RG_Sx", "RG_AMB",
];

const MAX_ARCHIVE_POINTS: i64 = 5000;

fn scalar(name: &str, data_type: DataType) -> AttributeDescriptor {
    AttributeDescriptor::new(name, data_type)
}

fn rw(name: &str, data_type: DataType) -> AttributeDescriptor {
    AttributeDescriptor::new(name, data_type).writable()
}

fn state(value: DevState) -> AttrValue {
    AttrValue::State(value)
}

fn set_state(dev: &SimDevice, value: DevState) -> Result<AttrValue, BusError> {
    dev.set_value("State", AttrValue::State(value));
    Ok(AttrValue::Void)
}

fn compressor(name: &str) -> Arc<SimDevice> {
    SimDevice::builder(name, "Compressor")
        .attribute(
            rw("Position", DataType::Long)
                .with_range(-200_000.0, 200_000.0)
                .with_format("%d")
                .with_unit("steps"),
            AttrValue::Int(1250),
        )
        .attribute(
            rw("Velocity", DataType::Double)
                .with_range(0.0, 5000.0)
                .with_format("%.1f"),
            AttrValue::Float(500.0),
        )
        .attribute(
            rw("Acceleration", DataType::Double).with_format("%.1f"),
            AttrValue::Float(200.0),
        )
        .attribute(
            scalar("Temperature", DataType::Double).with_unit("°C"),
            AttrValue::Float(31.4),
        )
        .attribute(
            scalar("Voltage", DataType::Double).with_unit("V"),
            AttrValue::Float(24.1),
        )
        .attribute(scalar("State", DataType::State), state(DevState::Standby))
        .command_fn("Stop", |dev, _| set_state(dev, DevState::Standby))
        .command_fn("goHome", |dev, _| {
            dev.set_value("Position", AttrValue::Int(0));
            set_state(dev, DevState::Standby)
        })
        .command("setHome")
        .build()
}

fn temperature_monitor(name: &str) -> Arc<SimDevice> {
    MONITOR_CHANNELS
        .iter()
        .enumerate()
        .fold(SimDevice::builder(name, "PiTemperature"), |b, (i, ch)| {
            b.attribute(
                scalar(ch, DataType::Double).with_unit("K"),
                AttrValue::Float(294.0 + 0.4 * i as f64),
            )
        })
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .build()
}

fn cryostat(name: &str, water_valve: &str) -> Arc<SimDevice> {
    SimDevice::builder(name, "CryostarCryostat")
        .attribute(
            scalar("pressure", DataType::Double).with_unit("mbar"),
            AttrValue::Float(2.4e-6),
        )
        .attribute(scalar("temperature", DataType::Double), AttrValue::Float(-183.0))
        .attribute(scalar("delta", DataType::Double), AttrValue::Float(1.0))
        .attribute(scalar("pump_status", DataType::Short), AttrValue::Int(1))
        .attribute(scalar("vacuum_status", DataType::Short), AttrValue::Int(1))
        .attribute(scalar("compressor_status", DataType::Short), AttrValue::Int(2))
        .attribute(scalar("temperature_status", DataType::Short), AttrValue::Int(3))
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .property("water_valve", &[water_valve])
        .command_fn("startCompressor", |dev, _| {
            dev.set_value("compressor_status", AttrValue::Int(2));
            Ok(AttrValue::Void)
        })
        .command_fn("stopCompressor", |dev, _| {
            dev.set_value("compressor_status", AttrValue::Int(0));
            Ok(AttrValue::Void)
        })
        .build()
}

fn dry_pump(name: &str) -> Arc<SimDevice> {
    SimDevice::builder(name, "EdwardsDryPump")
        .attribute(scalar("Frequency", DataType::Double).with_unit("Hz"), AttrValue::Float(100.0))
        .attribute(scalar("Current", DataType::Double).with_unit("A"), AttrValue::Float(3.2))
        .attribute(scalar("Voltage", DataType::Double).with_unit("V"), AttrValue::Float(398.0))
        .attribute(scalar("Power", DataType::Double).with_unit("W"), AttrValue::Float(1270.0))
        .attribute(scalar("Temperature", DataType::Long).with_unit("°C"), AttrValue::Int(42))
        .attribute(
            scalar("Pressure", DataType::Double).with_unit("mbar"),
            AttrValue::Float(3.1e-2),
        )
        .attribute(rw("EnablePurge", DataType::Boolean), AttrValue::Bool(true))
        .attribute(rw("EnableBallast", DataType::Boolean), AttrValue::Bool(false))
        .attribute(scalar("CompressedAir", DataType::Boolean), AttrValue::Bool(true))
        .attribute(scalar("WaterValve", DataType::State), state(DevState::Open))
        .attribute(
            rw("FreqSetpoint", DataType::Double).with_range(0.0, 120.0),
            AttrValue::Float(100.0),
        )
        .attribute(scalar("State", DataType::State), state(DevState::Running))
        .command_fn("Start", |dev, _| {
            let target = dev
                .value("FreqSetpoint")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            dev.set_value("Frequency", AttrValue::Float(target));
            set_state(dev, DevState::Running)
        })
        .command_fn("Stop", |dev, _| {
            dev.set_value("Frequency", AttrValue::Float(0.0));
            set_state(dev, DevState::Standby)
        })
        .command_fn("Reset", |dev, _| set_state(dev, DevState::Standby))
        .build()
}

fn valve(name: &str, open: bool) -> Arc<SimDevice> {
    SimDevice::builder(name, "CoolingValve")
        .attribute(
            scalar("State", DataType::State),
            state(if open { DevState::Open } else { DevState::Close }),
        )
        .command_fn("Open", |dev, _| set_state(dev, DevState::Open))
        .command_fn("Close", |dev, _| set_state(dev, DevState::Close))
        .build()
}

fn chiller(name: &str) -> Arc<SimDevice> {
    let set_temperature: CommandHandler = Arc::new(|dev, arg| {
        let target = arg.as_ref().and_then(AttrValue::as_f64).ok_or_else(|| {
            BusError::new(dev_name(dev), BusErrorKind::Command, "Missing target temperature")
        })?;
        dev.set_value("Temperature", AttrValue::Float(target));
        Ok(AttrValue::Void)
    });
    SimDevice::builder(name, "Chiller")
        .attribute(
            scalar("Temperature", DataType::Double)
                .with_unit("°C")
                .with_format("%.1f"),
            AttrValue::Float(18.5),
        )
        .attribute(
            scalar("PercentOutput", DataType::Double)
                .with_unit("%")
                .with_format("%.1f"),
            AttrValue::Float(34.0),
        )
        .attribute(scalar("FanSpeed", DataType::Long).with_unit("rpm"), AttrValue::Int(1200))
        .attribute(
            scalar("MotorCurrent", DataType::Double)
                .with_unit("A")
                .with_format("%.2f"),
            AttrValue::Float(1.25),
        )
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .command_info(
            CommandInfo {
                name: "SetTemperature".into(),
                in_type: Some(ArgType::Scalar(DataType::Double)),
                in_description: "Target temperature in °C".into(),
                out_type: None,
                out_description: "Uninitialised".into(),
            },
            Some(set_temperature),
        )
        .build()
}

fn dev_name(dev: &SimDevice) -> String {
    use labpanel_core::bus::DeviceProxy;
    dev.name().to_string()
}

/// Wavelength axis of the simulated spectrometers, in nm.
pub fn wavelength_axis(pixels: usize) -> Vec<f64> {
    (0..pixels)
        .map(|i| 200.0 + 900.0 * i as f64 / (pixels.max(2) - 1) as f64)
        .collect()
}

/// Spectrum with a peak at 800 nm over a dark level, plus noise.
pub fn synthetic_spectrum(wavelength: &[f64], rng: &SimRng) -> Vec<f64> {
    wavelength
        .iter()
        .map(|wl| {
            let d = wl - 800.0;
            1000.0 + 12_000.0 * (-(d * d) / (2.0 * 6.0 * 6.0)).exp() + rng.gen_range(-40.0..40.0)
        })
        .collect()
}

fn spectrometer(name: &str, class: &str, tec: bool, rng: &SimRng) -> Arc<SimDevice> {
    let wl = wavelength_axis(2048);
    let spectrum = synthetic_spectrum(&wl, rng);
    let (model, serial) = if tec {
        ("AvaSpec-ULS2048", "1607123U1")
    } else {
        ("HR4000", "HR4C1234")
    };
    let mut builder = SimDevice::builder(name, class)
        .attribute(scalar("Model", DataType::String), AttrValue::Str(model.into()))
        .attribute(scalar("SerialNumber", DataType::String), AttrValue::Str(serial.into()))
        .attribute(
            scalar("Wavelength", DataType::Double)
                .with_data_format(DataFormat::Spectrum)
                .with_unit("nm"),
            AttrValue::Spectrum(wl),
        )
        .attribute(
            scalar("Spectrum", DataType::Double).with_data_format(DataFormat::Spectrum),
            AttrValue::Spectrum(spectrum),
        )
        .attribute(rw("BoxcarWidth", DataType::Long).with_range(0.0, 100.0), AttrValue::Int(0))
        .attribute(
            rw("ScansToAverage", DataType::Long).with_range(1.0, 1000.0),
            AttrValue::Int(1),
        )
        .attribute(
            rw("IntegrationTime", DataType::Double)
                .with_range(0.01, 60_000.0)
                .with_unit("ms"),
            AttrValue::Float(100.0),
        )
        .attribute(rw("enableBackgroundSubtraction", DataType::Boolean), AttrValue::Bool(false))
        .attribute(rw("enableElectricalDarkCorrection", DataType::Boolean), AttrValue::Bool(true))
        .attribute(rw("enableNLCorrection", DataType::Boolean), AttrValue::Bool(false))
        .attribute(scalar("State", DataType::State), state(DevState::Running))
        .command("storeBackground");
    if tec {
        builder = builder
            .attribute(rw("EnableTEC", DataType::Boolean), AttrValue::Bool(true))
            .attribute(
                rw("TECSetPoint", DataType::Double)
                    .with_range(-20.0, 30.0)
                    .with_unit("°C"),
                AttrValue::Float(5.0),
            )
            .attribute(
                scalar("TECTemperature", DataType::Double).with_unit("°C"),
                AttrValue::Float(5.1),
            );
    }
    builder.build()
}

fn camera(name: &str, rng: &SimRng) -> Arc<SimDevice> {
    let image = |attr: &str| {
        (
            scalar(attr, DataType::UShort).with_data_format(DataFormat::Image),
            AttrValue::Image(synthetic_frame(rng)),
        )
    };
    let (d0, v0) = image(SIMULATED_ATTRIBUTES[0]);
    let (d1, v1) = image(SIMULATED_ATTRIBUTES[1]);
    SimDevice::builder(name, "BaslerGigE")
        .attribute(d0, v0)
        .attribute(d1, v1)
        .attribute(
            rw("ExposureTime", DataType::Double)
                .with_range(20.0, 1_000_000.0)
                .with_unit("us")
                .with_format("%.1f"),
            AttrValue::Float(5000.0),
        )
        .attribute(
            rw("Gain", DataType::Double).with_range(0.0, 24.0).with_format("%.2f"),
            AttrValue::Float(0.0),
        )
        .attribute(rw("EnableTrigger", DataType::Boolean), AttrValue::Bool(false))
        .attribute(
            rw("TriggerSource", DataType::Enum).with_enum_labels(["Software", "Line1", "Line2"]),
            AttrValue::Enum(0),
        )
        .attribute(
            rw("PixelFormat", DataType::Enum).with_enum_labels(["Mono8", "Mono12", "Mono16"]),
            AttrValue::Enum(1),
        )
        .attribute(
            rw("AutoExposure", DataType::Enum).with_enum_labels(["Off", "Once", "Continuous"]),
            AttrValue::Enum(0),
        )
        .attribute(
            rw("AutoBrightnessTarget", DataType::Double)
                .with_range(0.0, 1.0)
                .with_format("%.2f"),
            AttrValue::Float(0.5),
        )
        .attribute(
            rw("AutoExposureLowerLimit", DataType::Double).with_format("%.1f"),
            AttrValue::Float(100.0),
        )
        .attribute(
            rw("AutoExposureUpperLimit", DataType::Double).with_format("%.1f"),
            AttrValue::Float(100_000.0),
        )
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .build()
}

fn positioner(name: &str, no_direct_control: bool) -> Arc<SimDevice> {
    SimDevice::builder(name, POSITIONER_CLASS)
        .attribute(
            rw("Position", DataType::Double)
                .with_range(-12_000.0, 12_000.0)
                .with_unit("um")
                .with_format("%.3f"),
            AttrValue::Float(0.0),
        )
        .attribute(scalar("IsCalibrated", DataType::Boolean), AttrValue::Bool(false))
        .attribute(scalar("IsReferenced", DataType::Boolean), AttrValue::Bool(false))
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .property(
            "no_direct_control",
            &[if no_direct_control { "true" } else { "false" }],
        )
        .command_fn("Calibrate", |dev, _| {
            dev.set_value("IsCalibrated", AttrValue::Bool(true));
            Ok(AttrValue::Void)
        })
        .command_fn("Reference", |dev, _| {
            dev.set_value("IsReferenced", AttrValue::Bool(true));
            dev.set_value("Position", AttrValue::Float(0.0));
            Ok(AttrValue::Void)
        })
        .command_fn("Stop", |dev, _| set_state(dev, DevState::On))
        .build()
}

/// Deterministic history of an archived attribute at unix time `t`.
pub fn archived_value(attribute: &str, t: f64) -> f64 {
    let phase = (t / 3600.0).sin();
    match attribute.rsplit('/').next().unwrap_or_default() {
        "pressure" if attribute.contains("cryo") => 2.5e-6 * (1.0 + 0.2 * phase),
        "pressure" => 3.0e-2 * (1.0 + 0.1 * phase),
        "temperature" if attribute.contains("cryo") => -183.0 + 0.5 * phase,
        "temperature" if attribute.contains("chiller") => 18.5 + 0.3 * phase,
        _ => 40.0 + 2.0 * phase,
    }
}

fn parse_archive_time(device: &str, text: &str) -> Result<NaiveDateTime, BusError> {
    NaiveDateTime::parse_from_str(text, ARCHIVE_TIME_FORMAT).map_err(|e| {
        BusError::new(
            device,
            BusErrorKind::Command,
            format!("Invalid date '{}': {}", text, e),
        )
    })
}

fn archive_extractor(name: &str) -> Arc<SimDevice> {
    let list: CommandHandler = Arc::new(|_, _| {
        Ok(AttrValue::StrArray(
            ARCHIVED_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
        ))
    });
    let extract: CommandHandler = Arc::new(|dev, arg| {
        let device = dev_name(dev);
        let Some(AttrValue::StrArray(args)) = arg else {
            return Err(BusError::new(device, BusErrorKind::Command, "Expected [attribute, start, end]"));
        };
        let [attribute, start, end] = args.as_slice() else {
            return Err(BusError::new(device, BusErrorKind::Command, "Expected [attribute, start, end]"));
        };
        if !ARCHIVED_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(attribute)) {
            return Err(BusError::new(
                device,
                BusErrorKind::Command,
                format!("Attribute {} is not archived", attribute),
            ));
        }
        let start = parse_archive_time(&device, start)?.and_utc().timestamp();
        let end = parse_archive_time(&device, end)?.and_utc().timestamp();
        let step = ((end - start) / MAX_ARCHIVE_POINTS).max(60);
        let mut doubles = Vec::new();
        let mut strings = Vec::new();
        let mut t = start;
        while t <= end {
            doubles.push(t as f64);
            strings.push(format!("{:e}", archived_value(attribute, t as f64)));
            t += step;
        }
        Ok(AttrValue::DoubleStringArray { doubles, strings })
    });

    SimDevice::builder(name, "HdbExtractor")
        .command_info(
            CommandInfo {
                name: "GetAttNameAll".into(),
                in_type: None,
                in_description: "Uninitialised".into(),
                out_type: Some(ArgType::Array(DataType::String)),
                out_description: "Archived attributes".into(),
            },
            Some(list),
        )
        .command_info(
            CommandInfo {
                name: "ExtractBetweenDates".into(),
                in_type: Some(ArgType::Array(DataType::String)),
                in_description: "[attribute, start, end]".into(),
                out_type: Some(ArgType::MixedArray),
                out_description: "Timestamps and values".into(),
            },
            Some(extract),
        )
        .attribute(scalar("State", DataType::State), state(DevState::On))
        .build()
}

/// The simulated installation.
#[derive(Debug)]
pub struct Laboratory {
    bus: Arc<SimBus>,
    settings: PanelSettings,
}

impl Laboratory {
    /// Register every device named in `settings` on a new bus.
    pub fn new(settings: &PanelSettings) -> Self {
        let bus = Arc::new(SimBus::new());
        let rng = SimRng::new(settings.simulation.seed);
        let names = &settings.devices;

        bus.add_device(compressor(&names.compressor));
        bus.add_device(temperature_monitor(&names.temperature_monitor));
        let water_valve = names
            .cooling_valves
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case("Cryostar"))
            .map(|(_, dev)| dev.clone())
            .unwrap_or_else(|| names.valve_xuv.clone());
        bus.add_device(cryostat(&names.cryostat, &water_valve));
        bus.add_device(dry_pump(&names.dry_pump));
        bus.add_device(chiller(&names.chiller));

        let mut valves: Vec<&str> = names.cooling_valves.iter().map(|(_, d)| d.as_str()).collect();
        valves.extend([names.valve_xuv.as_str(), names.valve_vmi.as_str()]);
        valves.sort_unstable();
        valves.dedup();
        for (i, name) in valves.iter().enumerate() {
            bus.add_device(valve(name, i % 3 != 2));
        }

        for (i, class) in settings.spectrometer.classes.iter().enumerate() {
            let name = format!("udyni/spectrometer/{}", class.to_lowercase());
            bus.add_device(spectrometer(&name, class, i > 0, &rng));
        }

        bus.add_device(camera(CAMERA_DEVICE, &rng));
        bus.set_free_property(REFERENCE_OBJECT, "camera", vec![CAMERA_DEVICE.to_string()]);

        for (i, no_direct) in [false, false, true].into_iter().enumerate() {
            bus.add_device(positioner(&format!("udyni/smaract/ch{}", i), no_direct));
        }

        bus.add_device(archive_extractor(&names.archive_extractor));

        tracing::info!(devices = bus.device_names().len(), "Simulated laboratory ready");
        Self {
            bus,
            settings: settings.clone(),
        }
    }

    /// [`Laboratory::new`] plus the devices of the configured scenario file.
    pub fn from_settings(settings: &PanelSettings) -> AppResult<Self> {
        let lab = Self::new(settings);
        if let Some(path) = &settings.simulation.scenario {
            tracing::info!(path = %path.display(), "Loading simulation scenario");
            Scenario::load(path)?.install(&lab.bus)?;
        }
        Ok(lab)
    }

    pub fn bus(&self) -> Arc<SimBus> {
        Arc::clone(&self.bus)
    }

    /// Start background drift of readings, spectra and camera frames.
    pub fn start_activity(&self) -> std::io::Result<Activity> {
        let mut tickers = Vec::new();
        let seed = self.settings.simulation.seed;

        let bus = Arc::clone(&self.bus);
        let names = self.settings.devices.clone();
        let rng = SimRng::new(seed);
        tickers.push(Ticker::spawn("sim-readings", Duration::from_secs(1), move || {
            drift_readings(&bus, &names, &rng);
        })?);

        let bus = Arc::clone(&self.bus);
        let classes = self.settings.spectrometer.classes.clone();
        let rng = SimRng::new(seed.map(|s| s.wrapping_add(1)));
        tickers.push(Ticker::spawn(
            "sim-spectra",
            self.settings.spectrum_refresh_interval(),
            move || {
                for class in &classes {
                    let name = format!("udyni/spectrometer/{}", class.to_lowercase());
                    let Some(dev) = bus.device(&name) else { continue };
                    let Some(AttrValue::Spectrum(wl)) = dev.value("Wavelength") else {
                        continue;
                    };
                    dev.set_value("Spectrum", AttrValue::Spectrum(synthetic_spectrum(&wl, &rng)));
                }
            },
        )?);

        let camera = self.bus.device(CAMERA_DEVICE);
        let frames = FrameGenerator::spawn(
            SIMULATED_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            Duration::from_millis(self.settings.camera.simulation_period_ms),
            seed.map(|s| s.wrapping_add(2)),
            move |attr, frame| {
                if let Some(dev) = &camera {
                    dev.set_value(attr, AttrValue::Image(frame));
                }
            },
        )?;

        Ok(Activity { tickers, frames })
    }
}

fn drift_readings(bus: &SimBus, names: &labpanel_core::config::DeviceNames, rng: &SimRng) {
    let jitter = |dev: &SimDevice, attr: &str, amount: f64| {
        if let Some(v) = dev.value(attr).and_then(|v| v.as_f64()) {
            dev.set_value(attr, AttrValue::Float(v + rng.gen_range(-amount..amount)));
        }
    };
    if let Some(dev) = bus.device(&names.temperature_monitor) {
        for ch in MONITOR_CHANNELS {
            jitter(&dev, ch, 0.2);
        }
    }
    if let Some(dev) = bus.device(&names.cryostat) {
        jitter(&dev, "pressure", 1e-8);
    }
    if let Some(dev) = bus.device(&names.compressor) {
        jitter(&dev, "Temperature", 0.05);
    }
    if let Some(dev) = bus.device(&names.dry_pump) {
        jitter(&dev, "Current", 0.02);
        jitter(&dev, "Power", 3.0);
    }
    if let Some(dev) = bus.device(&names.chiller) {
        jitter(&dev, "Temperature", 0.05);
    }
}

/// Background simulation threads; stopped and joined on drop.
#[derive(Debug)]
pub struct Activity {
    tickers: Vec<Ticker>,
    frames: FrameGenerator,
}

impl Activity {
    pub fn stop(&mut self) {
        for ticker in &mut self.tickers {
            ticker.stop();
        }
        self.frames.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labpanel_core::bus::{live_devices_by_class, DeviceBus, DeviceProxy};

    fn lab() -> Laboratory {
        let mut settings = PanelSettings::default();
        settings.simulation.seed = Some(11);
        Laboratory::new(&settings)
    }

    #[test]
    fn every_configured_device_exists() {
        let settings = PanelSettings::default();
        let lab = lab();
        let bus = lab.bus();
        for name in [
            &settings.devices.compressor,
            &settings.devices.cryostat,
            &settings.devices.dry_pump,
            &settings.devices.chiller,
            &settings.devices.valve_xuv,
            &settings.devices.archive_extractor,
        ] {
            assert!(bus.connect(name).is_ok(), "{} missing", name);
        }
        assert_eq!(
            bus.get_property(REFERENCE_OBJECT, "camera").unwrap(),
            vec![CAMERA_DEVICE]
        );
        assert_eq!(live_devices_by_class(bus.as_ref(), "OOSpectrometer").unwrap().len(), 1);
    }

    #[test]
    fn extractor_returns_paired_arrays() {
        let lab = lab();
        let dev = lab.bus().connect("archiving/hdb/hdbextractor.1").unwrap();
        let out = dev
            .command(
                "ExtractBetweenDates",
                Some(AttrValue::StrArray(vec![
                    ARCHIVED_ATTRIBUTES[0].into(),
                    "2024-01-01 00:00:00".into(),
                    "2024-01-01 01:00:00".into(),
                ])),
            )
            .unwrap();
        let AttrValue::DoubleStringArray { doubles, strings } = out else {
            panic!("unexpected result {:?}", out);
        };
        assert_eq!(doubles.len(), 61);
        assert_eq!(doubles.len(), strings.len());
        assert!(strings[0].parse::<f64>().is_ok());

        let err = dev
            .command("ExtractBetweenDates", Some(AttrValue::StrArray(vec!["x".into()])))
            .unwrap_err();
        assert_eq!(err.kind, BusErrorKind::Command);
    }

    #[test]
    fn pump_commands_drive_state() {
        let lab = lab();
        let pump = lab.bus().device("udyni/vacuum/mainpump01").unwrap();
        pump.command("Stop", None).unwrap();
        assert_eq!(pump.value("State"), Some(AttrValue::State(DevState::Standby)));
        assert_eq!(pump.value("Frequency"), Some(AttrValue::Float(0.0)));
        pump.command("Start", None).unwrap();
        assert_eq!(pump.value("Frequency"), Some(AttrValue::Float(100.0)));
    }

    #[test]
    fn activity_pushes_camera_frames() {
        let mut settings = PanelSettings::default();
        settings.camera.simulation_period_ms = 10;
        let lab = Laboratory::new(&settings);
        let camera = lab.bus().device(CAMERA_DEVICE).unwrap();
        let before = camera.value("Image_00");
        let mut activity = lab.start_activity().unwrap();
        std::thread::sleep(Duration::from_millis(80));
        activity.stop();
        assert_ne!(camera.value("Image_00"), before);
    }
}
