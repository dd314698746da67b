//! The six end-to-end action scenarios exercised against a real `Dispatcher` wired to fake
//! adapters: label-learned retry, ordinal disambiguation, a chain that switches the active
//! app mid-flight, the circuit breaker tripping (and its per-app scope), a recipe shortcut,
//! and three-tier route replay.

mod support;

use nexus_core::config::Config;
use nexus_core::intent::{ParsedIntent, RecordKind, WorkflowOp};
use nexus_core::model::Role;
use nexus_core::store::{RecordedStep, RecordedStepKind};
use support::{build_harness, FakeApp, FakeElement};

#[test]
fn label_learned_retry_translates_target_through_a_learned_alias() {
    let harness = build_harness(Config::default());
    let app = FakeApp {
        elements: vec![FakeElement::new(Role::Button, "AXButton", "Enregistrer", 30.0, 30.0)],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);
    harness.store.label_learn("Demo", "save", "Enregistrer").unwrap();

    let outcome = harness.dispatcher.dispatch_text("click Save", Some("Demo"), Some(1));

    assert!(outcome.ok, "expected learned-label retry to succeed, got: {:?}", outcome.error);
    assert_eq!(outcome.via_label.as_deref(), Some("save -> Enregistrer"));
    assert_eq!(harness.input.clicks.lock().unwrap().len(), 1);
}

#[test]
fn ordinal_disambiguation_picks_the_nth_match_in_discovery_order() {
    let harness = build_harness(Config::default());
    let app = FakeApp {
        elements: vec![
            FakeElement::new(Role::Group, "AXGroup", "Row", 10.0, 10.0),
            FakeElement::new(Role::Group, "AXGroup", "Row", 10.0, 50.0),
            FakeElement::new(Role::Group, "AXGroup", "Row", 10.0, 90.0),
        ],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);

    let outcome = harness.dispatcher.dispatch_text("click the second row", Some("Demo"), Some(1));

    assert!(outcome.ok, "expected ordinal click to succeed, got: {:?}", outcome.error);
    let clicks = harness.input.clicks.lock().unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!((clicks[0].0, clicks[0].1), (10.0, 50.0));
}

#[test]
fn chain_switches_the_active_app_then_drives_the_new_one() {
    let harness = build_harness(Config::default());
    harness.accessibility.register_app(1, "Terminal", FakeApp::default());
    harness.accessibility.set_frontmost(1);
    harness.accessibility.register_app(2, "Calculator", FakeApp { elements: Vec::new(), window: Some((0.0, 0.0, 200.0, 300.0)) });

    let outcome = harness.dispatcher.dispatch_text("open Calculator; press 2; press 3; press enter", Some("Terminal"), Some(1));

    assert!(outcome.ok, "expected chain to succeed, got: {:?}", outcome.error);
    assert_eq!(harness.accessibility.activate_calls(), vec!["Calculator".to_string()]);
    assert_eq!(harness.input.key_presses.lock().unwrap().len(), 3);
}

#[test]
fn circuit_breaker_trips_after_threshold_consecutive_failures_in_an_app() {
    let config = Config { circuit_breaker_threshold: 3, ..Config::default() };
    let harness = build_harness(config);
    harness.accessibility.register_app(1, "Demo", FakeApp::default());
    harness.accessibility.set_frontmost(1);

    for _ in 0..3 {
        let outcome = harness.dispatcher.dispatch_text("click Submit", Some("Demo"), Some(1));
        assert!(!outcome.ok);
    }

    let tripped = harness.dispatcher.dispatch_text("click Submit", Some("Demo"), Some(1));
    assert!(!tripped.ok);
    let message = tripped.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("circuit broken"), "unexpected error: {message}");
    // No click was ever synthesized; every attempt failed at element lookup or the breaker.
    assert!(harness.input.clicks.lock().unwrap().is_empty());
}

#[test]
fn circuit_breaker_is_scoped_per_app() {
    let config = Config { circuit_breaker_threshold: 3, ..Config::default() };
    let harness = build_harness(config);
    harness.accessibility.register_app(1, "Demo", FakeApp::default());
    harness.accessibility.register_app(2, "Finder", FakeApp {
        elements: vec![FakeElement::new(Role::Button, "AXButton", "Trash", 5.0, 5.0)],
        window: Some((0.0, 0.0, 300.0, 300.0)),
    });
    harness.accessibility.set_frontmost(1);

    for _ in 0..3 {
        harness.dispatcher.dispatch_text("click Submit", Some("Demo"), Some(1));
    }
    // Demo's breaker is now tripped, but Finder has its own failure history.
    let other_app = harness.dispatcher.dispatch_text("click Trash", Some("Finder"), Some(2));
    assert!(other_app.ok, "expected unrelated app's action to proceed, got: {:?}", other_app.error);
}

#[test]
fn recipe_shortcut_short_circuits_gui_handling() {
    let harness = build_harness(Config::default());

    let outcome = harness.dispatcher.dispatch_text("set volume to 40", None, None);

    assert!(outcome.ok, "expected recipe match to succeed, got: {:?}", outcome.error);
    assert_eq!(outcome.via.as_deref(), Some("recipe(set-volume)"));
    assert_eq!(harness.scripting.calls.lock().unwrap().as_slice(), ["set volume output volume 40".to_string()]);
    // Recipes never touch the GUI adapters.
    assert!(harness.input.clicks.lock().unwrap().is_empty());
}

#[test]
fn route_replay_falls_back_to_relative_coordinates_when_the_window_has_moved() {
    let harness = build_harness(Config::default());
    // The route was recorded against a window at (0,0,800,600); by replay time the window
    // has shifted right by 100px, so only the relative-coordinate tier still locates the click.
    harness.accessibility.register_app(7, "Demo", FakeApp { elements: Vec::new(), window: Some((100.0, 0.0, 800.0, 600.0)) });

    let step = RecordedStep {
        step_num: 1,
        ts_offset_ms: 0,
        kind: RecordedStepKind::Click,
        x: Some(400.0),
        y: Some(300.0),
        rel_x: Some(0.5),
        rel_y: Some(0.5),
        window: Some((0.0, 0.0, 800.0, 600.0)),
        button: Some("left".to_string()),
        key_code: None,
        key_label: None,
        modifiers: Default::default(),
        ax_role: None,
        ax_label: None,
        pid: Some(7),
        app_name: Some("Demo".to_string()),
    };
    harness.store.route_create("demo-route", Some("Demo"), 500, &[step]).unwrap();

    let intent = ParsedIntent::WorkflowOp(WorkflowOp::Replay { name: "demo-route".to_string(), kind: RecordKind::Route });
    let outcome = harness.dispatcher.dispatch_intent("replay route demo-route", &intent, None, None);

    assert!(outcome.ok, "expected route replay to succeed, got: {:?}", outcome.error);
    let clicks = harness.input.clicks.lock().unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!((clicks[0].0, clicks[0].1), (500.0, 300.0));
}
