//! Archiving viewer and command console against the simulated laboratory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use labpanel_core::attribute::AttrValue;
use labpanel_core::bus::DeviceBus;
use labpanel_core::config::PanelSettings;
use labpanel_panels::archiving::TimeRange;
use labpanel_panels::{ArchivingPanel, CommandExecuter};
use labpanel_sim::presets::ARCHIVED_ATTRIBUTES;
use labpanel_sim::{Laboratory, Operation, SimBus};
use tracing_test::traced_test;

fn lab() -> (PanelSettings, Arc<SimBus>) {
    let mut settings = PanelSettings::default();
    settings.simulation.seed = Some(5);
    settings.archiving.retry_delay_ms = 1;
    let lab = Laboratory::new(&settings);
    (settings, lab.bus())
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 2)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

fn open_archive(settings: &PanelSettings, bus: &Arc<SimBus>) -> ArchivingPanel {
    let mut panel = ArchivingPanel::open(
        Arc::clone(bus) as Arc<dyn DeviceBus>,
        &settings.devices,
        &settings.archiving,
        at(12, 0),
    )
    .unwrap();
    panel.range = TimeRange::BeginEnd {
        begin: at(9, 0),
        end: Some(at(10, 0)),
    };
    panel
}

#[test]
fn archive_tree_groups_attributes() {
    let (settings, bus) = lab();
    let mut panel = open_archive(&settings, &bus);
    let devices: Vec<&str> = panel.tree.iter().map(|g| g.device.as_str()).collect();
    assert_eq!(
        devices,
        ["udyni/cooling/chiller", "udyni/laser/cryo", "udyni/vacuum/mainpump01"]
    );

    panel.set_device_selected("udyni/laser/cryo", true);
    assert!(panel.is_selected("udyni/laser/cryo/pressure"));
    assert!(panel.is_selected("udyni/laser/cryo/temperature"));
    assert_eq!(panel.selected().count(), 2);
    panel.set_device_selected("udyni/laser/cryo", false);
    assert_eq!(panel.selected().count(), 0);
}

#[traced_test]
#[test]
fn archive_extraction_skips_failing_attributes() {
    let (settings, bus) = lab();
    let mut panel = open_archive(&settings, &bus);
    panel.set_selected(ARCHIVED_ATTRIBUTES[0], true);
    panel.set_selected("udyni/laser/cryo/bogus", true);
    panel.refresh_blocking(at(12, 0));

    let series = panel.series();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].attribute, ARCHIVED_ATTRIBUTES[0]);
    assert_eq!(series[0].times.len(), 61);
    assert_eq!(series[0].values.len(), 61);
    assert!(series[0].values.iter().all(|v| v.is_finite()));
    assert!(logs_contain("Fetch failed, skipping"));
}

#[test]
fn archive_extraction_retries() {
    let (settings, bus) = lab();
    let mut panel = open_archive(&settings, &bus);
    bus.device(&settings.devices.archive_extractor)
        .unwrap()
        .fail_next(Operation::Command, "ExtractBetweenDates", 1);
    panel.set_selected(ARCHIVED_ATTRIBUTES[2], true);
    panel.refresh_blocking(at(12, 0));
    assert_eq!(panel.series().len(), 1);
}

#[test]
fn archive_refreshes_in_background_and_smooths() {
    let (settings, bus) = lab();
    let mut panel = open_archive(&settings, &bus);
    panel.set_selected(ARCHIVED_ATTRIBUTES[3], true);
    panel.start_refresh(at(12, 0)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut arrived = false;
    while !arrived && Instant::now() < deadline {
        arrived = panel.poll();
        if !arrived {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    assert!(arrived);
    assert!(!panel.is_busy());
    assert_eq!(panel.series().len(), 1);

    let raw = panel.displayed(0).unwrap();
    panel.enable_smoothing(true);
    assert_eq!(panel.smoothing(), Some(11));
    assert_eq!(panel.displayed(0).unwrap().len(), raw.len());

    panel.set_window_length("500");
    assert_eq!(panel.displayed(0).unwrap(), raw);
    panel.set_window_length("wide");
    assert_eq!(panel.smoothing(), Some(11));
    assert!(panel.displayed(1).is_none());
}

#[test]
fn archive_requires_the_extractor() {
    let (settings, bus) = lab();
    bus.device(&settings.devices.archive_extractor)
        .unwrap()
        .set_online(false);
    let err = ArchivingPanel::open(
        Arc::clone(&bus) as Arc<dyn DeviceBus>,
        &settings.devices,
        &settings.archiving,
        at(12, 0),
    )
    .err()
    .unwrap();
    assert_eq!(err.title, "Extractor not available");
}

#[test]
fn executer_runs_commands_with_arguments() {
    let (settings, bus) = lab();
    let mut console = CommandExecuter::new(Arc::clone(&bus) as Arc<dyn DeviceBus>);
    console.set_device(&settings.devices.chiller);
    assert_eq!(console.device(), Some(settings.devices.chiller.as_str()));
    assert!(console.commands.contains(&"SetTemperature".to_string()));
    let mut sorted = console.commands.clone();
    sorted.sort();
    assert_eq!(console.commands, sorted);

    console.select_command("SetTemperature");
    assert!(console.is_enabled());
    assert!(console.argument_enabled());
    assert_eq!(
        console.description,
        "Input: Target temperature in °C (type: DevDouble)\nOutput: None (type: DevVoid)"
    );

    assert_eq!(console.execute("warm").unwrap_err().title, "Bad argument");
    console.execute("21.5").unwrap();
    assert!(console
        .result
        .starts_with("Command: udyni/cooling/chiller/SetTemperature\nDuration: "));
    assert!(console.result.ends_with("Result: None"));
    let chiller = bus.device(&settings.devices.chiller).unwrap();
    assert_eq!(chiller.value("Temperature"), Some(AttrValue::Float(21.5)));

    chiller.fail_next(Operation::Command, "SetTemperature", 1);
    console.execute("20").unwrap();
    assert_eq!(console.result, "Command SetTemperature failed");
}

#[test]
fn executer_disabled_without_device() {
    let (_, bus) = lab();
    let mut console = CommandExecuter::new(Arc::clone(&bus) as Arc<dyn DeviceBus>);
    console.set_device("udyni/nowhere/nothing");
    assert!(console.device().is_none());
    assert!(console.commands.is_empty());
    assert!(!console.is_enabled());
    console.execute("1").unwrap();
    assert!(console.result.is_empty());
}
