//! Integration coverage for dispatch-time properties that only show up when the whole
//! `Dispatcher` pipeline runs: chain stop-at-first-failure, and the unsafe-dialog guard.

mod support;

use nexus_core::config::Config;
use nexus_core::model::{Bounds, Role, WindowInfo};
use support::{build_harness, FakeApp, FakeElement};

#[test]
fn chain_stops_at_first_failing_step() {
    let harness = build_harness(Config::default());
    let app = FakeApp {
        elements: vec![FakeElement::new(Role::Button, "AXButton", "Second", 50.0, 50.0)],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);

    let outcome = harness.dispatcher.dispatch_text("click First; click Second", Some("Demo"), Some(1));

    assert!(!outcome.ok);
    assert!(outcome.result_text.starts_with("step 1: "));
    // The chain must never reach the second step's click.
    assert!(harness.input.clicks.lock().unwrap().is_empty());
}

#[test]
fn chain_runs_every_step_when_all_succeed() {
    let harness = build_harness(Config::default());
    let app = FakeApp {
        elements: vec![
            FakeElement::new(Role::Button, "AXButton", "First", 10.0, 10.0),
            FakeElement::new(Role::Button, "AXButton", "Second", 50.0, 50.0),
        ],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);

    let outcome = harness.dispatcher.dispatch_text("click First; click Second", Some("Demo"), Some(1));

    assert!(outcome.ok, "expected chain to succeed, got: {:?}", outcome.error);
    assert_eq!(harness.input.clicks.lock().unwrap().len(), 2);
}

#[test]
fn unsafe_dialog_blocks_dispatch_regardless_of_auto_dismiss_config() {
    let config = Config { auto_dismiss_safe_dialogs: true, ..Config::default() };
    let harness = build_harness(config);
    let app = FakeApp {
        elements: vec![FakeElement::new(Role::Button, "AXButton", "Save", 20.0, 20.0)],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);

    // SecurityAgent is classified as an unsafe password prompt (never auto-dismissable),
    // regardless of the auto_dismiss_safe_dialogs preference.
    harness.window_list.set_owner_windows(
        "SecurityAgent",
        vec![WindowInfo {
            app_name: "SecurityAgent".to_string(),
            title: "Enter Password".to_string(),
            pid: 999,
            bounds: Bounds { x: 0.0, y: 0.0, w: 200.0, h: 100.0 },
        }],
    );

    let outcome = harness.dispatcher.dispatch_text("click Save", Some("Demo"), Some(1));

    assert!(!outcome.ok);
    assert!(harness.input.clicks.lock().unwrap().is_empty());
    assert!(outcome.error.is_some());
}

#[test]
fn no_dialog_present_lets_the_action_through() {
    let harness = build_harness(Config::default());
    let app = FakeApp {
        elements: vec![FakeElement::new(Role::Button, "AXButton", "Save", 20.0, 20.0)],
        window: Some((0.0, 0.0, 400.0, 300.0)),
    };
    harness.accessibility.register_app(1, "Demo", app);
    harness.accessibility.set_frontmost(1);

    let outcome = harness.dispatcher.dispatch_text("click Save", Some("Demo"), Some(1));

    assert!(outcome.ok, "expected click to succeed, got: {:?}", outcome.error);
    assert_eq!(harness.input.clicks.lock().unwrap().len(), 1);
}
