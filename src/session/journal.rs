//! Action journal: an in-memory 50-entry ring of past `act` outcomes (spec §3, §4.9).
//! Consulted by the circuit breaker (§4.7) and appended to every response's formatted tail.

use crate::model::JournalEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct ActionJournal {
    entries: Mutex<VecDeque<JournalEntry>>,
    capacity: usize,
}

impl ActionJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, entry: JournalEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Newest-first snapshot of the whole ring, used by the circuit breaker's reverse scan
    /// (§4.7, §9 open question: "walks the journal in reverse order until a success is seen").
    pub fn recent(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    /// Last `n` entries in chronological order, for the 3-line response tail (§4.5, §7).
    pub fn tail(&self, n: usize) -> Vec<JournalEntry> {
        let entries = self.entries.lock();
        entries.iter().rev().take(n).rev().cloned().collect()
    }

    /// §4.7 circuit breaker: counts consecutive failures in `app` within `window`, scanning
    /// backward from the most recent entry and stopping at the first success in that app
    /// (§9 open question, resolved: reset is per-app, not global).
    pub fn consecutive_failures_in_app(&self, app: &str, window: std::time::Duration, now_s: f64) -> Vec<JournalEntry> {
        let mut failures = Vec::new();
        for entry in self.recent() {
            if entry.app != app {
                continue;
            }
            if now_s - entry.ts > window.as_secs_f64() {
                break;
            }
            if entry.ok {
                break;
            }
            failures.push(entry);
        }
        failures
    }
}

impl Default for ActionJournal {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(app: &str, ok: bool, ts: f64) -> JournalEntry {
        JournalEntry {
            ts,
            intent_text: "click Submit".into(),
            app: app.into(),
            ok,
            elapsed_s: 0.1,
            error: if ok { String::new() } else { "not found".into() },
            post_diff: String::new(),
        }
    }

    #[test]
    fn ring_trims_to_capacity() {
        let journal = ActionJournal::new(3);
        for i in 0..5 {
            journal.push(entry("Demo", true, i as f64));
        }
        assert_eq!(journal.recent().len(), 3);
    }

    #[test]
    fn consecutive_failures_stop_at_success() {
        let journal = ActionJournal::new(50);
        journal.push(entry("Demo", true, 0.0));
        journal.push(entry("Demo", false, 1.0));
        journal.push(entry("Demo", false, 2.0));
        journal.push(entry("Demo", false, 3.0));
        let failures = journal.consecutive_failures_in_app("Demo", std::time::Duration::from_secs(30), 3.0);
        assert_eq!(failures.len(), 3);
    }

    #[test]
    fn consecutive_failures_ignore_other_apps() {
        let journal = ActionJournal::new(50);
        journal.push(entry("Other", false, 0.0));
        journal.push(entry("Demo", false, 1.0));
        journal.push(entry("Demo", false, 2.0));
        let failures = journal.consecutive_failures_in_app("Demo", std::time::Duration::from_secs(30), 2.0);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn consecutive_failures_respect_window() {
        let journal = ActionJournal::new(50);
        journal.push(entry("Demo", false, 0.0));
        journal.push(entry("Demo", false, 100.0));
        let failures = journal.consecutive_failures_in_app("Demo", std::time::Duration::from_secs(30), 100.0);
        assert_eq!(failures.len(), 1);
    }
}
