//! Control channel: a single JSON document on disk, owned by the host, read before every
//! dispatch and written to for telemetry (spec §4.9, §6).
//!
//! Grounded on `original_source/nexus/state.py`'s control-channel section: atomic
//! temp-then-rename writes, a 200ms telemetry flush rate limit, always-flush at action
//! boundaries, and a single-use `hint` field.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlState {
    pub paused: bool,
    pub hint: Option<String>,
    pub hint_ts: Option<f64>,

    // Write-only telemetry fields; the host reads these, the core never does.
    pub tool: Option<String>,
    pub action: Option<String>,
    pub status: Option<String>,
    pub step: Option<u32>,
    pub elapsed: Option<f64>,
    #[serde(default)]
    pub log: Vec<String>,
}

const FLUSH_RATE_LIMIT: Duration = Duration::from_millis(200);

/// Owns the on-disk control-channel file. Reads always hit disk (the host may have written
/// since our last read); writes are rate-limited except at action boundaries, where a flush
/// is forced regardless of the rate limit (spec §4.9).
pub struct ControlChannel {
    path: PathBuf,
    last_flush: Mutex<Option<Instant>>,
    pending: Mutex<ControlState>,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_flush: Mutex::new(None),
            pending: Mutex::new(ControlState::default()),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nexus")
            .join("control.json")
    }

    /// Reads the current state from disk, falling back to defaults if absent/corrupt —
    /// missing/garbled state must never block dispatch.
    pub fn read(&self) -> ControlState {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn is_paused(&self) -> bool {
        self.read().paused
    }

    /// Consumes the single-use `hint` field: returns it and clears it on disk.
    pub fn take_hint(&self) -> Option<String> {
        let mut state = self.read();
        let hint = state.hint.take();
        if hint.is_some() {
            state.hint_ts = None;
            let _ = self.write_atomic(&state);
        }
        hint
    }

    /// Merges telemetry fields into the pending state and flushes if the rate limit allows,
    /// or unconditionally when `force` is set (action boundaries per spec §4.9).
    pub fn record_telemetry(
        &self,
        tool: Option<&str>,
        action: Option<&str>,
        status: Option<&str>,
        step: Option<u32>,
        elapsed: Option<f64>,
        force: bool,
    ) {
        {
            let mut pending = self.pending.lock();
            if let Some(t) = tool {
                pending.tool = Some(t.to_string());
            }
            if let Some(a) = action {
                pending.action = Some(a.to_string());
            }
            if let Some(s) = status {
                pending.status = Some(s.to_string());
                pending.log.push(s.to_string());
                if pending.log.len() > 20 {
                    pending.log.remove(0);
                }
            }
            if let Some(s) = step {
                pending.step = Some(s);
            }
            if let Some(e) = elapsed {
                pending.elapsed = Some(e);
            }
        }

        let mut last = self.last_flush.lock();
        let due = force || last.map(|t| t.elapsed() >= FLUSH_RATE_LIMIT).unwrap_or(true);
        if due {
            let current = self.read();
            let mut merged = self.pending.lock().clone();
            // Preserve host-owned fields we don't touch.
            merged.paused = current.paused;
            merged.hint = current.hint;
            merged.hint_ts = current.hint_ts;
            let _ = self.write_atomic(&merged);
            *last = Some(Instant::now());
        }
    }

    fn write_atomic(&self, state: &ControlState) -> std::io::Result<()> {
        atomic_write(&self.path, &serde_json::to_vec_pretty(state)?)
    }
}

/// Write-to-temp-then-rename, matching spec §5/§4.9's atomicity requirement for the
/// control-channel file.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let channel = ControlChannel::new(dir.path().join("control.json"));
        assert!(!channel.is_paused());
    }

    #[test]
    fn take_hint_is_single_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.json");
        let state = ControlState {
            hint: Some("try the CLI".into()),
            ..Default::default()
        };
        atomic_write(&path, &serde_json::to_vec(&state).unwrap()).unwrap();
        let channel = ControlChannel::new(path);
        assert_eq!(channel.take_hint(), Some("try the CLI".into()));
        assert_eq!(channel.take_hint(), None);
    }

    #[test]
    fn paused_flag_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.json");
        let state = ControlState {
            paused: true,
            ..Default::default()
        };
        atomic_write(&path, &serde_json::to_vec(&state).unwrap()).unwrap();
        let channel = ControlChannel::new(path);
        assert!(channel.is_paused());
    }
}
