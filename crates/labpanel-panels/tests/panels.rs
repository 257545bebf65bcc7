//! Panel controllers driven against the simulated laboratory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use labpanel_core::attribute::{AttrValue, DevState};
use labpanel_core::bus::DeviceBus;
use labpanel_core::config::PanelSettings;
use labpanel_core::dispatch::EventBridge;
use labpanel_panels::common::{LedState, Panel};
use labpanel_panels::compressor::CompressorTab;
use labpanel_panels::cooling::Valve;
use labpanel_panels::{
    CompressorPanel, CoolingPanel, CryostatPanel, PositionerPanel, SpectrometerPanel, VacuumPanel,
};
use labpanel_sim::{Laboratory, Operation, SimBus};
use labpanel_storage::ExportFormat;
use tracing_test::traced_test;

fn lab() -> (PanelSettings, Arc<SimBus>) {
    let mut settings = PanelSettings::default();
    settings.simulation.seed = Some(7);
    let lab = Laboratory::new(&settings);
    (settings, lab.bus())
}

fn dyn_bus(bus: &Arc<SimBus>) -> Arc<dyn DeviceBus> {
    Arc::clone(bus) as Arc<dyn DeviceBus>
}

fn pump(bridge: &mut EventBridge, panel: &mut dyn Panel) -> usize {
    let events = bridge.drain();
    for event in &events {
        panel.handle_event(event);
    }
    events.len()
}

#[test]
fn compressor_moves_relative_and_reads_monitor() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel = CompressorPanel::open(dyn_bus(&bus), &settings.devices, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.temperature, "31.4 °C");
    assert_eq!(panel.state.text, "Standby");

    panel.move_by(10).unwrap();
    let device = bus.device(&settings.devices.compressor).unwrap();
    assert_eq!(device.value("Position"), Some(AttrValue::Int(1260)));

    panel.select_tab(CompressorTab::Temperatures).unwrap();
    pump(&mut bridge, &mut panel);
    assert!(panel.channel_texts().all(|(_, text)| text.ends_with("°C")));

    panel.select_tab(CompressorTab::Move).unwrap();
    let monitor = bus.device(&settings.devices.temperature_monitor).unwrap();
    assert_eq!(monitor.subscriber_count("RP_AMB"), 0);
}

#[test]
fn compressor_monitor_failure_degrades() {
    let (settings, bus) = lab();
    let bridge = EventBridge::new();
    bus.device(&settings.devices.temperature_monitor)
        .unwrap()
        .set_online(false);
    let mut panel = CompressorPanel::open(dyn_bus(&bus), &settings.devices, bridge.sink()).unwrap();
    let err = panel.select_tab(CompressorTab::Temperatures).unwrap_err();
    assert_eq!(err.title, "Failed to connect to temperature monitor");
    assert!(panel.channel_texts().all(|(_, text)| text == "N.A."));
}

#[test]
fn cryostat_follows_status_codes() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel = CryostatPanel::open(dyn_bus(&bus), &settings.devices, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    assert_eq!(panel.water_valve(), "udyni/cooling/valve_12");
    assert_eq!(panel.pressure, "2.40e-06 mbar");
    assert_eq!(panel.temperature, "-183 °C");
    assert_eq!(panel.compressor_status.state(), LedState::On);
    assert!(!panel.start_enabled);

    panel.stop_compressor().unwrap();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.compressor_status.state(), LedState::Off);
    assert!(panel.start_enabled);
}

#[test]
#[traced_test]
fn cryostat_marks_timed_out_device_offline() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel = CryostatPanel::open(dyn_bus(&bus), &settings.devices, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    bus.device(&settings.devices.cryostat).unwrap().emit_timeout();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.offline_devices(), [settings.devices.cryostat.clone()]);
    assert!(logs_contain("Device is offline"));
}

#[test]
fn cryostat_requires_the_device() {
    let (settings, bus) = lab();
    bus.device(&settings.devices.cryostat).unwrap().set_online(false);
    let err = CryostatPanel::open(dyn_bus(&bus), &settings.devices, EventBridge::new().sink())
        .err()
        .unwrap();
    assert_eq!(err.title, "Device not found");
    assert_eq!(err.message, "The Cryostar device is not running");
}

#[test]
fn vacuum_setpoint_is_validated_and_verified() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        VacuumPanel::open(dyn_bus(&bus), &settings.devices, &settings.vacuum, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.pressure, "3.10E-02");
    assert_eq!(panel.state.text, "Running");
    assert_eq!(panel.water_valve.text, "Water open");

    let err = panel.commit_setpoint("130").unwrap_err();
    assert_eq!(err.message, "The given value is not valid. Should be between 0 and 120");
    let err = panel.commit_setpoint("fast").unwrap_err();
    assert_eq!(err.message, "The given value is not a valid number");

    panel.commit_setpoint("80").unwrap();
    let pump_dev = bus.device(&settings.devices.dry_pump).unwrap();
    assert_eq!(pump_dev.value("FreqSetpoint"), Some(AttrValue::Float(80.0)));

    pump_dev.fail_next(Operation::Write, "FreqSetpoint", 1);
    let err = panel.commit_setpoint("90").unwrap_err();
    assert_eq!(err.title, "Set failed");
    assert!(err.message.starts_with("Failed to set frequency (Error: "));
}

#[test]
fn vacuum_poll_skips_focused_field() {
    let (settings, bus) = lab();
    let bridge = EventBridge::new();
    let mut panel =
        VacuumPanel::open(dyn_bus(&bus), &settings.devices, &settings.vacuum, bridge.sink()).unwrap();
    let start = Instant::now();
    panel.tick(start);
    assert_eq!(panel.setpoint, "100");

    let pump_dev = bus.device(&settings.devices.dry_pump).unwrap();
    pump_dev.set_value("FreqSetpoint", AttrValue::Float(60.0));
    panel.set_setpoint_focus(true);
    panel.tick(start + Duration::from_secs(2));
    assert_eq!(panel.setpoint, "100");

    panel.set_setpoint_focus(false);
    panel.tick(start + Duration::from_secs(4));
    assert_eq!(panel.setpoint, "60");
}

#[test]
fn cooling_toggles_valves() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel = CoolingPanel::open(dyn_bus(&bus), &settings.devices, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    let xuv = bus.device(&settings.devices.valve_xuv).unwrap();
    let before = xuv.value("State").and_then(|v| v.as_state());
    let expected_button = if before == Some(DevState::Open) { "Close" } else { "Open" };
    assert_eq!(panel.xuv_button.text, expected_button);

    panel.toggle(Valve::Xuv).unwrap();
    pump(&mut bridge, &mut panel);
    let after = xuv.value("State").and_then(|v| v.as_state());
    assert_ne!(before, after);
    assert_ne!(panel.xuv_button.text, expected_button);
    assert_eq!(panel.chiller.len(), 5);
    assert!(panel.chiller.iter().all(|w| !w.is_inert()));

    xuv.set_value("State", AttrValue::State(DevState::Moving));
    let err = panel.toggle(Valve::Xuv).unwrap_err();
    assert_eq!(err.message, "Cannot operate the valve!");
}

#[test]
fn positioner_skips_protected_channels_and_rolls_back() {
    let (_, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel = PositionerPanel::open(dyn_bus(&bus), bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.devices, vec!["udyni/smaract/ch0", "udyni/smaract/ch1"]);
    assert_eq!(panel.current_device(), Some("udyni/smaract/ch0"));

    panel.set_position(5.0).unwrap();
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.position, 5.0);

    let ch0 = bus.device("udyni/smaract/ch0").unwrap();
    ch0.fail_next(Operation::Write, "Position", 1);
    let err = panel.set_position(7.0).unwrap_err();
    assert_eq!(err.title, "Failed to set position");
    assert_eq!(panel.setpoint, 5.0);

    panel.select_device("udyni/smaract/ch1").unwrap();
    assert_eq!(ch0.subscriber_count("Position"), 0);
    assert_eq!(panel.setpoint, 0.0);
}

#[test]
fn spectrometer_shows_spectrum_and_settings() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    assert_eq!(panel.devices.len(), 2);
    assert_eq!(panel.current_device(), Some("udyni/spectrometer/oospectrometer"));
    assert!(!panel.has_tec());
    assert_eq!(panel.tec_temperature, "N.A.");
    assert_eq!(panel.status.text, "Running");
    assert_eq!(panel.integration_time, "100.00 ms");
    assert_eq!(panel.spectrum.len(), 2048);
    let bandwidth: f64 = panel.bandwidth.parse().unwrap();
    assert!((8.0..20.0).contains(&bandwidth), "bandwidth {}", bandwidth);

    panel.set_integration_time("250 ms").unwrap();
    let dev = bus.device("udyni/spectrometer/oospectrometer").unwrap();
    assert_eq!(dev.value("IntegrationTime"), Some(AttrValue::Float(250.0)));
    assert_eq!(panel.set_scans_to_average("many").unwrap_err().title, "Bad value");

    panel.set_nl_correction(true).unwrap();
    assert!(panel.nl_correction);
    dev.fail_next(Operation::Write, "enableNLCorrection", 1);
    assert!(panel.set_nl_correction(false).is_err());
    assert!(panel.nl_correction);
}

#[test]
fn spectrometer_ignores_settings_in_fault() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    let dev = bus.device("udyni/spectrometer/oospectrometer").unwrap();
    dev.set_value("State", AttrValue::State(DevState::Fault));
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.status.text, "Fault");

    panel.set_boxcar_width("4").unwrap();
    assert_eq!(dev.write_count("BoxcarWidth"), 0);
}

#[test]
fn spectrometer_with_tec_and_rescan() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, bridge.sink()).unwrap();
    panel.select("udyni/spectrometer/avantesspectrometer");
    pump(&mut bridge, &mut panel);
    assert!(panel.has_tec());
    assert_eq!(panel.tec_setpoint, "5.0 °C");
    assert!(panel.tec_enabled);

    panel.set_tec_setpoint("-2.5 °C").unwrap();
    let dev = bus.device("udyni/spectrometer/avantesspectrometer").unwrap();
    assert_eq!(dev.value("TECSetPoint"), Some(AttrValue::Float(-2.5)));

    panel.rescan();
    assert_eq!(panel.current_device(), Some("udyni/spectrometer/avantesspectrometer"));

    dev.set_online(false);
    panel.rescan();
    assert_eq!(panel.devices.len(), 1);
    assert_eq!(panel.current_device(), Some("udyni/spectrometer/oospectrometer"));
}

#[test]
fn spectrometer_drops_fast_spectra() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);
    let shown = panel.spectrum.clone();

    let dev = bus.device("udyni/spectrometer/oospectrometer").unwrap();
    dev.set_value("Spectrum", AttrValue::Spectrum(vec![1.0; 2048]));
    pump(&mut bridge, &mut panel);
    assert_eq!(panel.spectrum, shown);
}

#[test]
fn spectrometer_exports_displayed_spectrum() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut panel =
        SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, bridge.sink()).unwrap();
    pump(&mut bridge, &mut panel);

    let dir = tempfile::tempdir().unwrap();
    let written = panel
        .export(ExportFormat::Csv, &dir.path().join("scan"))
        .unwrap()
        .unwrap();
    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("csv"));
    let text = std::fs::read_to_string(&written).unwrap();
    assert_eq!(text.lines().count(), 2048);
    assert!(text.starts_with("200.00,"));

    panel.add_overlay();
    panel.add_overlay();
    assert_eq!(panel.overlays.len(), 2);
    panel.clear_overlays();
    assert!(panel.overlays.is_empty());
}

#[test]
fn spectrometer_requires_a_device() {
    let (mut settings, bus) = lab();
    settings.spectrometer.classes = vec!["NoSuchClass".into()];
    let err = SpectrometerPanel::open(dyn_bus(&bus), &settings.spectrometer, EventBridge::new().sink())
        .err()
        .unwrap();
    assert_eq!(err.title, "No spectrometer found");
}
