//! Fail-then-success label correlation (spec §4.8): when `click Save` fails for want of a
//! matching element and `click Guardar` succeeds shortly after in the same app with the same
//! verb, the original target is learned as an alias for the one that worked. Grounded on
//! `learn.py`'s `record_failure`/`correlate_success`/`_prune_old_failures`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

struct Failure {
    app: String,
    verb: String,
    target: String,
    ts: f64,
}

pub struct PendingFailures {
    entries: Mutex<VecDeque<Failure>>,
    window: Duration,
}

impl PendingFailures {
    pub fn new(window: Duration) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), window }
    }

    /// Records a GUI-handler failure for later correlation. `app`/`verb`/`target` are
    /// lowercased on entry so lookups are case-insensitive.
    pub fn record_failure(&self, app: &str, verb: &str, target: &str, now_s: f64) {
        let mut entries = self.entries.lock();
        entries.push_back(Failure {
            app: app.to_lowercase(),
            verb: verb.to_lowercase(),
            target: target.to_lowercase(),
            ts: now_s,
        });
        Self::prune(&mut entries, self.window, now_s);
    }

    /// Searches backward for the most recent same-app, same-verb failure with a *different*
    /// target within the correlation window. Returns the original failed target on a match
    /// and removes that entry, so each failure correlates at most once.
    pub fn correlate_success(&self, app: &str, verb: &str, target: &str, now_s: f64) -> Option<String> {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, self.window, now_s);

        let app = app.to_lowercase();
        let verb = verb.to_lowercase();
        let target = target.to_lowercase();

        let idx = entries.iter().rposition(|f| {
            f.app == app
                && f.verb == verb
                && f.target != target
                && now_s - f.ts < self.window.as_secs_f64()
        })?;
        let failure = entries.remove(idx)?;
        Some(failure.target)
    }

    fn prune(entries: &mut VecDeque<Failure>, window: Duration, now_s: f64) {
        let cutoff = now_s - window.as_secs_f64();
        while entries.front().is_some_and(|f| f.ts < cutoff) {
            entries.pop_front();
        }
    }
}

impl Default for PendingFailures {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlates_different_target_same_verb_and_app() {
        let pf = PendingFailures::default();
        pf.record_failure("Demo", "click", "Save", 0.0);
        let original = pf.correlate_success("Demo", "click", "Guardar", 1.0);
        assert_eq!(original, Some("save".to_string()));
    }

    #[test]
    fn does_not_correlate_same_target() {
        let pf = PendingFailures::default();
        pf.record_failure("Demo", "click", "Save", 0.0);
        assert_eq!(pf.correlate_success("Demo", "click", "Save", 1.0), None);
    }

    #[test]
    fn does_not_correlate_across_apps() {
        let pf = PendingFailures::default();
        pf.record_failure("Demo", "click", "Save", 0.0);
        assert_eq!(pf.correlate_success("Other", "click", "Guardar", 1.0), None);
    }

    #[test]
    fn expires_after_window() {
        let pf = PendingFailures::default();
        pf.record_failure("Demo", "click", "Save", 0.0);
        assert_eq!(pf.correlate_success("Demo", "click", "Guardar", 100.0), None);
    }

    #[test]
    fn each_failure_correlates_once() {
        let pf = PendingFailures::default();
        pf.record_failure("Demo", "click", "Save", 0.0);
        assert_eq!(pf.correlate_success("Demo", "click", "Guardar", 1.0), Some("save".to_string()));
        assert_eq!(pf.correlate_success("Demo", "click", "Guardar2", 2.0), None);
    }
}
