//! Route recording (spec §4.10): drains a [`RawEventTap`] after a recording session and
//! converts its raw events into the [`RecordedStep`] schema persisted by `store::routes`.

use crate::adapters::{RawEventKind, RawEventTap};
use crate::error::Result;
use crate::store::{RecordedStep, RecordedStepKind, Store};

/// Stops `tap`, converts its buffered events into [`RecordedStep`]s, and persists them as a
/// named route. Relative coordinates and window bounds are threaded straight through from
/// the tap's own event-tap enrichment (spec §4.10: "enriched with ... window bounds
/// containing the point and relative coordinates within").
pub fn record_route(store: &Store, tap: &dyn RawEventTap, name: &str, app: Option<&str>) -> Result<i64> {
    let events = tap.stop();
    let duration_ms = events.last().map(|e| e.ts_offset_ms).unwrap_or(0);

    let steps: Vec<RecordedStep> = events
        .into_iter()
        .enumerate()
        .map(|(i, e)| RecordedStep {
            step_num: i as u32 + 1,
            ts_offset_ms: e.ts_offset_ms,
            kind: match e.kind {
                RawEventKind::Click => RecordedStepKind::Click,
                RawEventKind::Key => RecordedStepKind::Key,
                RawEventKind::Scroll => RecordedStepKind::Scroll,
            },
            x: e.x,
            y: e.y,
            rel_x: e.rel_x,
            rel_y: e.rel_y,
            window: e.window,
            button: e.button,
            key_code: e.key_code,
            key_label: e.key_char,
            modifiers: e.modifiers,
            ax_role: e.ax_role,
            ax_label: e.ax_label,
            pid: None,
            app_name: app.map(|a| a.to_string()),
        })
        .collect();

    store.route_create(name, app, duration_ms, &steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Modifiers, RawInputEvent};
    use parking_lot::Mutex;

    struct FakeTap {
        events: Mutex<Vec<RawInputEvent>>,
    }

    impl RawEventTap for FakeTap {
        fn start(&self) -> Result<()> {
            Ok(())
        }
        fn stop(&self) -> Vec<RawInputEvent> {
            self.events.lock().drain(..).collect()
        }
        fn is_running(&self) -> bool {
            false
        }
    }

    #[test]
    fn recorded_route_persists_events_as_steps() {
        let store = Store::open_in_memory().unwrap();
        let tap = FakeTap {
            events: Mutex::new(vec![RawInputEvent {
                ts_offset_ms: 120,
                kind: RawEventKind::Click,
                x: Some(400.0),
                y: Some(300.0),
                button: Some("left".to_string()),
                key_code: None,
                key_char: None,
                modifiers: Modifiers::default(),
                window: Some((100.0, 100.0, 600.0, 400.0)),
                rel_x: Some(0.5),
                rel_y: Some(0.5),
                ax_role: Some("AXButton".to_string()),
                ax_label: Some("Save".to_string()),
            }]),
        };
        record_route(&store, &tap, "test-route", Some("Demo")).unwrap();
        let route = store.route_get("test-route").unwrap().unwrap();
        assert_eq!(route.steps.len(), 1);
        assert_eq!(route.steps[0].x, Some(400.0));
    }
}
