//! Camera panel, reference review and camera setup against the simulated
//! laboratory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use labpanel_core::attribute::AttrValue;
use labpanel_core::bus::DeviceBus;
use labpanel_core::config::PanelSettings;
use labpanel_core::dispatch::EventBridge;
use labpanel_core::reference::{Reference, REFERENCE_OBJECT};
use labpanel_panels::camera::{Profile, View};
use labpanel_panels::camera_setup::SETUP_ATTRIBUTES;
use labpanel_panels::review::Coordinate;
use labpanel_panels::{CameraPanel, CameraSetup, Panel, ReviewSession};
use labpanel_sim::{synthetic_frame, Laboratory, SimBus, SimRng, CAMERA_DEVICE};

fn lab() -> (PanelSettings, Arc<SimBus>) {
    let mut settings = PanelSettings::default();
    settings.simulation.seed = Some(11);
    settings.camera.frame_interval_ms = 0;
    let lab = Laboratory::new(&settings);
    (settings, lab.bus())
}

fn pump(bridge: &mut EventBridge, panel: &mut dyn Panel) -> usize {
    let events = bridge.drain();
    for event in &events {
        panel.handle_event(event);
    }
    events.len()
}

fn open_camera(settings: &PanelSettings, bus: &Arc<SimBus>, bridge: &EventBridge) -> CameraPanel {
    CameraPanel::open(Arc::clone(bus) as Arc<dyn DeviceBus>, settings, false, bridge.sink()).unwrap()
}

fn push_frame(bus: &SimBus, seed: u64) {
    let device = bus.device(CAMERA_DEVICE).unwrap();
    device.set_value("Image_01", AttrValue::Image(synthetic_frame(&SimRng::new(Some(seed)))));
}

#[test]
fn camera_views_share_one_subscription() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut camera = open_camera(&settings, &bus, &bridge);

    assert_eq!(camera.device_name(), CAMERA_DEVICE);
    assert_eq!(camera.attributes, vec!["Image_00".to_string(), "Image_01".to_string()]);
    for view in View::ALL {
        assert_eq!(camera.selected(view), Some("Image_01"));
    }
    assert_eq!(camera.subscription_count(), 1);

    pump(&mut bridge, &mut camera);
    let frame = camera.frame(View::Left).unwrap();
    assert!(frame.centroid.is_none());
    assert_eq!(camera.profile(Profile::Horizontal).unwrap().len(), 100);
    assert_eq!(camera.profile(Profile::Vertical).unwrap().len(), 120);
    assert!(camera.marker(View::Left).is_none());

    camera.select(View::Right, "Image_00");
    assert_eq!(camera.subscription_count(), 2);
    camera.select(View::Right, "Image_00");
    assert_eq!(camera.subscription_count(), 2);
}

#[test]
fn camera_tracks_the_beam() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut camera = open_camera(&settings, &bus, &bridge);
    pump(&mut bridge, &mut camera);

    camera.options_mut(View::Left, Profile::Horizontal).tracking = true;
    assert!(camera.is_tracked("Image_01"));
    push_frame(&bus, 1);
    pump(&mut bridge, &mut camera);

    let marker = camera.marker(View::Left).unwrap();
    assert!((30.0..70.0).contains(&marker.x), "x {}", marker.x);
    assert!((30.0..70.0).contains(&marker.y), "y {}", marker.y);
    assert!(marker.ellipse.is_none());
    assert!(camera.last_centroid("Image_01").is_some());

    camera.options_mut(View::Left, Profile::Horizontal).swap = true;
    assert!(camera.marker(View::Left).unwrap().ellipse.is_some());
}

#[test]
fn projection_fits_and_autoscales_profiles() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut camera = open_camera(&settings, &bus, &bridge);

    camera.options_mut(View::Projection, Profile::Horizontal).gauss = true;
    camera.options_mut(View::Projection, Profile::Vertical).autoscale = true;
    push_frame(&bus, 2);
    pump(&mut bridge, &mut camera);

    let fit = camera.profile_fit(Profile::Horizontal).unwrap();
    assert!((30.0..70.0).contains(&fit.mean), "mean {}", fit.mean);
    assert!(camera.profile_fit(Profile::Vertical).is_none());

    let (low, high) = camera.profile_range(Profile::Vertical).unwrap();
    assert!(low < high);
    assert!(camera.profile_range(Profile::Horizontal).is_none());
}

#[test]
fn simulated_camera_runs_without_a_device() {
    let (mut settings, bus) = lab();
    settings.camera.simulation_period_ms = 10;
    let mut bridge = EventBridge::new();
    let mut camera =
        CameraPanel::open(Arc::clone(&bus) as Arc<dyn DeviceBus>, &settings, true, bridge.sink()).unwrap();
    assert!(camera.is_simulation());
    assert_eq!(camera.device_name(), "simulator");
    assert!(camera.device().is_none());

    let deadline = Instant::now() + Duration::from_secs(5);
    while camera.frame(View::Left).is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
        pump(&mut bridge, &mut camera);
    }
    assert!(camera.frame(View::Left).is_some());

    camera.set_reference("Image_01", Some(Reference::new(50.0, 60.0, 10.0, 10.0)));
    camera.save_references().unwrap();
    assert!(bus
        .get_property(REFERENCE_OBJECT, "simulator:image_01")
        .unwrap()
        .is_empty());
    camera.shutdown();
}

#[test]
fn camera_requires_a_configured_device() {
    let (settings, bus) = lab();
    bus.set_free_property(REFERENCE_OBJECT, "camera", Vec::new());
    let bridge = EventBridge::new();
    let err = CameraPanel::open(Arc::clone(&bus) as Arc<dyn DeviceBus>, &settings, false, bridge.sink())
        .err()
        .unwrap();
    assert_eq!(err.title, "No camera");

    bus.device(CAMERA_DEVICE).unwrap().set_online(false);
    bus.set_free_property(REFERENCE_OBJECT, "camera", vec![CAMERA_DEVICE.to_string()]);
    let err = CameraPanel::open(Arc::clone(&bus) as Arc<dyn DeviceBus>, &settings, false, bridge.sink())
        .err()
        .unwrap();
    assert_eq!(err.title, "Failed to connect to camera");
}

#[test]
fn review_saves_centroid_reference() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut camera = open_camera(&settings, &bus, &bridge);
    camera.options_mut(View::Left, Profile::Horizontal).tracking = true;
    push_frame(&bus, 3);
    pump(&mut bridge, &mut camera);

    let mut review = ReviewSession::open(&camera, View::Left);
    assert_eq!(review.attribute(), Some("Image_01"));
    assert!(!review.is_modified());

    review.set_from_centroid(&camera).unwrap();
    assert!(review.is_modified());
    let centroid = camera.last_centroid("Image_01").unwrap();
    let working = review.reference().unwrap();
    assert_eq!(working.x, centroid.x);
    assert_eq!(working.y, centroid.y);

    let err = review.select_view(&camera, View::Right).unwrap_err();
    assert_eq!(err.title, "Reference modified");
    let (mut review, err) = review.close().unwrap_err();
    assert_eq!(err.title, "Reference modified");

    review.save(&mut camera).unwrap();
    assert!(!review.is_modified());
    assert_eq!(camera.references().get("Image_01"), Some(working));
    let stored = bus
        .get_property(REFERENCE_OBJECT, "udyni/laser/camera:image_01")
        .unwrap();
    assert_eq!(stored, vec![working.encode()]);
    assert!(review.close().is_ok());
}

#[test]
fn review_needs_tracking_and_resets() {
    let (settings, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut camera = open_camera(&settings, &bus, &bridge);
    pump(&mut bridge, &mut camera);

    let mut review = ReviewSession::open(&camera, View::Right);
    assert_eq!(review.set_from_centroid(&camera).unwrap_err().title, "Cannot get centroid");
    assert_eq!(review.set_from_gauss(&camera).unwrap_err().title, "Cannot get fit");

    review.set(Coordinate::H, 12.5);
    let edited = review.reference().unwrap();
    assert_eq!(edited.h, 12.5);
    assert_eq!(edited.x, 0.0);
    assert!(camera.references().get("Image_01").is_none());

    review.reset(&camera);
    assert!(!review.is_modified());
    assert!(review.reference().is_none());
    review.select_view(&camera, View::Projection).unwrap();
    assert_eq!(review.view(), View::Projection);
}

#[test]
fn camera_setup_binds_every_attribute() {
    let (_, bus) = lab();
    let mut bridge = EventBridge::new();
    let mut setup = CameraSetup::open(Arc::clone(&bus) as Arc<dyn DeviceBus>, None, bridge.sink()).unwrap();
    assert_eq!(setup.cameras, vec![CAMERA_DEVICE.to_string()]);
    assert_eq!(setup.current(), Some(CAMERA_DEVICE));
    assert_eq!(setup.widgets.len(), SETUP_ATTRIBUTES.len());
    assert!(setup.widgets.iter().all(|w| !w.is_inert()));

    for event in bridge.drain() {
        setup.handle_event(&event);
    }
    assert_eq!(setup.widget("exposuretime").unwrap().display_text(), "5000.0");

    bus.device(CAMERA_DEVICE).unwrap().set_value("Gain", AttrValue::Float(3.5));
    for event in bridge.drain() {
        setup.handle_event(&event);
    }
    assert_eq!(setup.widget("Gain").unwrap().display_text(), "3.50");
}

#[test]
fn camera_setup_without_cameras() {
    let (_, bus) = lab();
    bus.set_free_property(REFERENCE_OBJECT, "CameraClasses", vec!["Nothing".into()]);
    let bridge = EventBridge::new();
    let err = CameraSetup::open(Arc::clone(&bus) as Arc<dyn DeviceBus>, None, bridge.sink())
        .err()
        .unwrap();
    assert_eq!(err.title, "No camera");
}
