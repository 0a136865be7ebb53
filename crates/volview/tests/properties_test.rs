//! Integration tests for VOI, colormap, preset and default-property handling.

use std::cell::RefCell;
use std::rc::Rc;

use volview::*;

struct Fixture {
    _engine: Rc<OffscreenRenderingEngine>,
    cache: Rc<InMemoryVolumeCache>,
    viewport: Viewport,
}

fn ct_volume(id: &str) -> ImageVolume {
    let metadata = VolumeMetadata {
        frame_of_reference_uid: "frame-1".to_string(),
        ..VolumeMetadata::default()
    };
    ImageVolume::new(
        id,
        metadata,
        UVec3::new(64, 64, 32),
        DVec3::ONE,
        DVec3::ZERO,
    )
    .with_scalar_range(-1000.0, 1000.0)
}

fn fixture(kind: ViewportType) -> Fixture {
    let engine = Rc::new(OffscreenRenderingEngine::new("engine"));
    let cache = Rc::new(InMemoryVolumeCache::new());
    cache.insert(ct_volume("ct"));
    let input = ViewportInput::new("vp", kind, 256, 256).with_options(ViewportOptions {
        orientation: Some(OrientationAxis::Axial.into()),
        ..ViewportOptions::default()
    });
    let mut viewport = Viewport::new(input, engine.clone(), cache.clone()).unwrap();
    pollster::block_on(viewport.set_volumes(&[VolumeInput::new("ct")], true)).unwrap();
    Fixture {
        _engine: engine,
        cache,
        viewport,
    }
}

fn record_events(viewport: &mut Viewport) -> Rc<RefCell<Vec<ViewportEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    viewport.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    events
}

fn assert_voi(actual: VoiRange, lower: f64, upper: f64, tolerance: f64) {
    assert!(
        (actual.lower - lower).abs() < tolerance && (actual.upper - upper).abs() < tolerance,
        "expected [{lower}, {upper}], got {actual:?}"
    );
}

fn color_nodes(viewport: &Viewport) -> usize {
    let entry = viewport.default_actor().unwrap();
    let actor = entry.actor.borrow();
    actor.property().rgb_transfer_function().size()
}

#[test]
fn test_initial_voi_spans_scalar_range() {
    let f = fixture(ViewportType::Orthographic);
    assert_voi(f.viewport.voi(None).unwrap(), -1000.0, 1000.0, 1e-12);
}

#[test]
fn test_initial_voi_from_window_metadata() {
    let mut f = fixture(ViewportType::Orthographic);
    let metadata = VolumeMetadata {
        frame_of_reference_uid: "frame-1".to_string(),
        window_center: Some(40.0),
        window_width: Some(400.0),
        ..VolumeMetadata::default()
    };
    f.cache.insert(
        ImageVolume::new("windowed", metadata, UVec3::splat(8), DVec3::ONE, DVec3::ZERO)
            .with_scalar_range(-1000.0, 1000.0),
    );
    pollster::block_on(f.viewport.set_volumes(&[VolumeInput::new("windowed")], true)).unwrap();
    assert_voi(f.viewport.voi(None).unwrap(), -160.0, 240.0, 1e-12);
}

#[test]
fn test_set_voi_linear() {
    let mut f = fixture(ViewportType::Orthographic);
    let events = record_events(&mut f.viewport);

    f.viewport.set_voi(VoiRange::new(-200.0, 300.0), None, false).unwrap();
    assert_voi(f.viewport.voi(None).unwrap(), -200.0, 300.0, 1e-9);
    assert_eq!(color_nodes(&f.viewport), 2);

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ViewportEvent::VoiModified {
            volume_id: Some(id),
            voi_lut_function: VoiLutFunction::Linear,
            invert_state_changed: false,
            ..
        } if id == "ct"
    ));
}

#[test]
fn test_set_voi_suppressed() {
    let mut f = fixture(ViewportType::Orthographic);
    let events = record_events(&mut f.viewport);
    f.viewport.set_voi(VoiRange::new(0.0, 100.0), None, true).unwrap();
    assert!(events.borrow().is_empty());
}

#[test]
fn test_sigmoid_round_trip() {
    let mut f = fixture(ViewportType::Orthographic);

    f.viewport
        .set_voi_lut_function(VoiLutFunction::SampledSigmoid, None, false)
        .unwrap();
    assert_eq!(color_nodes(&f.viewport), 1024);
    assert_voi(f.viewport.voi(None).unwrap(), -1000.0, 1000.0, 1e-3);

    f.viewport.set_voi(VoiRange::new(-100.0, 500.0), None, false).unwrap();
    assert_voi(f.viewport.voi(None).unwrap(), -100.0, 500.0, 1e-3);

    // switching back restores a linear ramp over the current window
    f.viewport
        .set_voi_lut_function(VoiLutFunction::Linear, None, false)
        .unwrap();
    assert_eq!(color_nodes(&f.viewport), 2);
    assert_voi(f.viewport.voi(None).unwrap(), -100.0, 500.0, 1e-3);
}

#[test]
fn test_invert_acts_on_change_only() {
    let mut f = fixture(ViewportType::Orthographic);
    let events = record_events(&mut f.viewport);

    f.viewport.set_invert(false, None, false).unwrap();
    assert!(events.borrow().is_empty());

    f.viewport.set_invert(true, None, false).unwrap();
    {
        let entry = f.viewport.default_actor().unwrap();
        let actor = entry.actor.borrow();
        assert_eq!(actor.property().rgb_transfer_function().color(-1000.0), DVec3::ONE);
    }
    assert!(matches!(
        events.borrow().last(),
        Some(ViewportEvent::VoiModified {
            invert_state_changed: true,
            ..
        })
    ));

    events.borrow_mut().clear();
    f.viewport.set_invert(true, None, false).unwrap();
    assert!(events.borrow().is_empty());

    f.viewport.set_invert(false, None, false).unwrap();
    let entry = f.viewport.default_actor().unwrap();
    let actor = entry.actor.borrow();
    assert_eq!(actor.property().rgb_transfer_function().color(-1000.0), DVec3::ZERO);
}

#[test]
fn test_invert_is_tracked_per_volume() {
    let mut f = fixture(ViewportType::Orthographic);
    f.cache.insert(ct_volume("pet"));
    let inputs = [VolumeInput::new("ct"), VolumeInput::new("pet")];
    pollster::block_on(f.viewport.set_volumes(&inputs, true)).unwrap();

    let low_color = |viewport: &Viewport, id: &str| {
        let entry = viewport.actor(id).unwrap();
        let actor = entry.actor.borrow();
        actor.property().rgb_transfer_function().color(-1000.0)
    };

    f.viewport.set_invert(true, Some("ct"), true).unwrap();
    f.viewport.set_invert(true, Some("pet"), true).unwrap();
    assert_eq!(low_color(&f.viewport, "ct"), DVec3::ONE);
    assert_eq!(low_color(&f.viewport, "pet"), DVec3::ONE);
    assert_eq!(f.viewport.properties(Some("pet")).unwrap().invert, Some(true));

    f.viewport.set_invert(false, Some("ct"), true).unwrap();
    assert_eq!(low_color(&f.viewport, "ct"), DVec3::ZERO);
    assert_eq!(low_color(&f.viewport, "pet"), DVec3::ONE);
    assert_eq!(f.viewport.properties(Some("ct")).unwrap().invert, Some(false));
}

#[test]
fn test_invert_survives_sigmoid_toggle() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport
        .set_voi_lut_function(VoiLutFunction::SampledSigmoid, None, true)
        .unwrap();
    f.viewport.set_invert(true, None, true).unwrap();
    f.viewport
        .set_voi_lut_function(VoiLutFunction::Linear, None, true)
        .unwrap();

    let entry = f.viewport.default_actor().unwrap();
    let actor = entry.actor.borrow();
    let cfun = actor.property().rgb_transfer_function();
    assert_eq!(cfun.size(), 2);
    assert!(cfun.color(cfun.range()[0]).x > 0.99);
}

#[test]
fn test_set_colormap() {
    let mut f = fixture(ViewportType::Orthographic);
    let events = record_events(&mut f.viewport);

    f.viewport
        .set_colormap(ColormapSpec::named("viridis"), None, false)
        .unwrap();
    assert!(color_nodes(&f.viewport) > 2);
    assert_voi(f.viewport.voi(None).unwrap(), -1000.0, 1000.0, 1e-9);
    assert!(matches!(
        events.borrow().last(),
        Some(ViewportEvent::ColormapModified { colormap, .. })
            if colormap.name.as_deref() == Some("viridis")
    ));

    let err = f
        .viewport
        .set_colormap(ColormapSpec::named("no-such-map"), None, false)
        .unwrap_err();
    assert!(matches!(err, ViewportError::UnknownColormap(name) if name == "no-such-map"));
}

#[test]
fn test_colormap_falls_back_to_preset_colors() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport
        .set_colormap(ColormapSpec::named("CT-Bone"), None, true)
        .unwrap();
    assert_eq!(color_nodes(&f.viewport), 4);
}

#[test]
fn test_colormap_with_opacity() {
    let mut f = fixture(ViewportType::Orthographic);
    let colormap = ColormapSpec {
        name: Some("hsv".to_string()),
        opacity: Some(OpacitySpec::Uniform(0.5)),
    };
    f.viewport.set_colormap(colormap.clone(), None, true).unwrap();

    {
        let entry = f.viewport.default_actor().unwrap();
        let actor = entry.actor.borrow();
        let ofun = actor.property().scalar_opacity();
        assert_eq!(ofun.points().len(), 2);
        assert!((ofun.value(0.0) - 0.5).abs() < 1e-12);
    }
    assert_eq!(f.viewport.properties(None).unwrap().colormap, Some(colormap));
}

#[test]
fn test_opacity_points_are_clamped() {
    let mut f = fixture(ViewportType::Orthographic);
    let points = vec![
        OpacityPoint {
            value: -500.0,
            opacity: -0.2,
        },
        OpacityPoint {
            value: 500.0,
            opacity: 1.5,
        },
    ];
    f.viewport.set_opacity(OpacitySpec::Points(points), None).unwrap();

    let entry = f.viewport.default_actor().unwrap();
    let actor = entry.actor.borrow();
    let ofun = actor.property().scalar_opacity();
    assert_eq!(ofun.value(-500.0), 0.0);
    assert_eq!(ofun.value(500.0), 1.0);
}

#[test]
fn test_set_preset() {
    let mut f = fixture(ViewportType::Volume3d);
    let events = record_events(&mut f.viewport);

    f.viewport.set_preset("CT-Bone", None, false).unwrap();
    {
        let entry = f.viewport.default_actor().unwrap();
        let actor = entry.actor.borrow();
        assert!(actor.property().shade);
        assert!(actor.property().use_gradient_opacity);
    }
    assert!(matches!(
        events.borrow().last(),
        Some(ViewportEvent::PresetModified { preset_name, .. }) if preset_name == "CT-Bone"
    ));

    events.borrow_mut().clear();
    f.viewport.set_preset("CT-Unknown", None, false).unwrap();
    assert!(events.borrow().is_empty());
    assert_eq!(
        f.viewport.properties(None).unwrap().preset.as_deref(),
        Some("CT-Bone")
    );
}

#[test]
fn test_interpolation_type() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport
        .set_interpolation_type(InterpolationType::Nearest, None)
        .unwrap();
    let properties = f.viewport.properties(None).unwrap();
    assert_eq!(properties.interpolation_type, Some(InterpolationType::Nearest));
}

#[test]
fn test_properties_readback() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport.set_voi(VoiRange::new(-50.0, 150.0), None, true).unwrap();
    f.viewport.set_slab_thickness(3.0, None);

    let properties = f.viewport.properties(Some("ct")).unwrap();
    assert_voi(properties.voi_range.unwrap(), -50.0, 150.0, 1e-9);
    assert_eq!(properties.voi_lut_function, Some(VoiLutFunction::Linear));
    assert_eq!(properties.invert, Some(false));
    assert_eq!(properties.slab_thickness, Some(3.0));
    assert!(properties.rotation.unwrap().abs() < 1e-4);
}

#[test]
fn test_properties_without_actor() {
    let engine = Rc::new(OffscreenRenderingEngine::new("engine"));
    let cache = Rc::new(InMemoryVolumeCache::new());
    let input = ViewportInput::new("vp", ViewportType::Orthographic, 64, 64);
    let mut viewport = Viewport::new(input, engine.clone(), cache).unwrap();
    assert!(matches!(
        viewport.set_voi(VoiRange::new(0.0, 1.0), None, false),
        Err(ViewportError::ActorNotFound(_))
    ));
    assert!(viewport.properties(None).is_err());
}

#[test]
fn test_first_properties_become_defaults() {
    let mut f = fixture(ViewportType::Orthographic);
    let initial = ViewportProperties {
        voi_range: Some(VoiRange::new(-500.0, 500.0)),
        invert: Some(false),
        ..ViewportProperties::default()
    };
    f.viewport.set_properties(&initial, None, false).unwrap();
    assert_eq!(f.viewport.default_properties(None), Some(initial.clone()));

    let later = ViewportProperties {
        voi_range: Some(VoiRange::new(0.0, 80.0)),
        invert: Some(true),
        ..ViewportProperties::default()
    };
    f.viewport.set_properties(&later, None, false).unwrap();
    assert_eq!(f.viewport.default_properties(None), Some(initial));
    assert_voi(f.viewport.voi(None).unwrap(), 0.0, 80.0, 1e-9);

    let events = record_events(&mut f.viewport);
    f.viewport.reset_properties(None).unwrap();
    assert!(events.borrow().is_empty());
    assert_voi(f.viewport.voi(None).unwrap(), -500.0, 500.0, 1e-9);
    assert_eq!(f.viewport.properties(None).unwrap().invert, Some(false));
}

#[test]
fn test_per_volume_defaults_override_global() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport.set_default_properties(
        ViewportProperties {
            voi_range: Some(VoiRange::new(-500.0, 500.0)),
            interpolation_type: Some(InterpolationType::Nearest),
            ..ViewportProperties::default()
        },
        None,
    );
    f.viewport.set_default_properties(
        ViewportProperties {
            voi_range: Some(VoiRange::new(-20.0, 20.0)),
            ..ViewportProperties::default()
        },
        Some("ct"),
    );

    f.viewport.reset_to_default_properties(Some("ct")).unwrap();
    let properties = f.viewport.properties(Some("ct")).unwrap();
    assert_voi(properties.voi_range.unwrap(), -20.0, 20.0, 1e-9);
    assert_eq!(properties.interpolation_type, Some(InterpolationType::Nearest));

    f.viewport.clear_default_properties(Some("ct"));
    assert_eq!(f.viewport.default_properties(Some("ct")), None);
    f.viewport.reset_to_default_properties(Some("ct")).unwrap();
    assert_voi(f.viewport.voi(None).unwrap(), -500.0, 500.0, 1e-9);
}

#[test]
fn test_reset_without_defaults_is_noop() {
    let mut f = fixture(ViewportType::Orthographic);
    f.viewport.set_voi(VoiRange::new(-1.0, 1.0), None, true).unwrap();
    f.viewport.clear_default_properties(None);
    f.viewport.reset_to_default_properties(None).unwrap();
    assert_voi(f.viewport.voi(None).unwrap(), -1.0, 1.0, 1e-9);
}

#[test]
fn test_volume_3d_reset_properties_restores_transfer_functions() {
    let mut f = fixture(ViewportType::Volume3d);
    f.viewport.set_preset("CT-Bone", None, true).unwrap();
    f.viewport.set_zoom(2.0);

    f.viewport.reset_properties(None).unwrap();
    assert_eq!(color_nodes(&f.viewport), 2);
    assert_voi(f.viewport.voi(None).unwrap(), -1000.0, 1000.0, 1e-12);
    assert_eq!(f.viewport.properties(None).unwrap().preset, None);
}

#[test]
fn test_properties_serde() {
    let json = r#"{
        "voiRange": {"lower": -160.0, "upper": 240.0},
        "VOILUTFunction": "SAMPLED_SIGMOID",
        "colormap": {"name": "Hot Iron", "opacity": 0.8},
        "slabThickness": 2.5
    }"#;
    let properties: ViewportProperties = serde_json::from_str(json).unwrap();
    assert_eq!(properties.voi_range, Some(VoiRange::new(-160.0, 240.0)));
    assert_eq!(properties.voi_lut_function, Some(VoiLutFunction::SampledSigmoid));
    assert_eq!(
        properties.colormap.as_ref().and_then(|c| c.opacity.clone()),
        Some(OpacitySpec::Uniform(0.8))
    );
    assert_eq!(properties.slab_thickness, Some(2.5));
}
