//! In-memory "currently recording a workflow" state (spec §4.6 `record start/stop`), one
//! active recording at a time. Grounded on `original_source/nexus/mind/workflows.py`'s
//! module-level `_recording` dict and `record_step`.

use parking_lot::Mutex;

struct Active {
    name: String,
    next_step: u32,
}

#[derive(Default)]
pub struct RecordingState {
    active: Mutex<Option<Active>>,
}

impl RecordingState {
    pub fn new() -> Self {
        Self { active: Mutex::new(None) }
    }

    /// Starts a new recording named `name`. Fails if one is already active.
    pub fn start(&self, name: &str) -> Result<(), String> {
        let mut active = self.active.lock();
        if let Some(existing) = active.as_ref() {
            return Err(format!(
                "already recording \"{}\"; use \"record stop\" first",
                existing.name
            ));
        }
        *active = Some(Active { name: name.to_string(), next_step: 1 });
        Ok(())
    }

    /// Stops the active recording, if any, returning its name and final step count.
    pub fn stop(&self) -> Option<(String, u32)> {
        self.active.lock().take().map(|a| (a.name, a.next_step - 1))
    }

    /// The step number to record for the next action, and the recording's name, advancing
    /// the counter. Returns `None` when nothing is being recorded.
    pub fn next_step(&self) -> Option<(String, u32)> {
        let mut active = self.active.lock();
        let a = active.as_mut()?;
        let step = a.next_step;
        a.next_step += 1;
        Some((a.name.clone(), step))
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_stop_reports_step_count() {
        let state = RecordingState::new();
        state.start("demo").unwrap();
        state.next_step();
        state.next_step();
        let (name, steps) = state.stop().unwrap();
        assert_eq!(name, "demo");
        assert_eq!(steps, 2);
    }

    #[test]
    fn cannot_start_while_already_recording() {
        let state = RecordingState::new();
        state.start("demo").unwrap();
        assert!(state.start("other").is_err());
    }

    #[test]
    fn next_step_none_when_idle() {
        let state = RecordingState::new();
        assert!(state.next_step().is_none());
    }
}
