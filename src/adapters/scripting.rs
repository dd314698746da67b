//! Scripting adapter: synchronous AppleScript execution, plus the clipboard atomic-paste
//! fallback used by the `type` GUI handler for long strings (spec §4.5).
//!
//! Grounded on `original_source/nexus/act/native.py` (AppleScript invocation, paste helper)
//! and the teacher's platform module's `osascript.rs` (`std::process::Command` invocation
//! idiom, kept verbatim here).

use super::{ScriptOutput, Scripting};
use crate::config::Config;
use crate::error::{NexusError, Result};
use std::process::Command;
use std::time::Duration;

#[derive(Default)]
pub struct MacScripting;

impl Scripting for MacScripting {
    fn run(&self, snippet: &str, timeout: Duration) -> Result<ScriptOutput> {
        run_osascript(snippet, timeout)
    }
}

#[cfg(target_os = "macos")]
fn run_osascript(snippet: &str, timeout: Duration) -> Result<ScriptOutput> {
    // `osascript` has no built-in timeout flag; a watchdog thread kills the child after
    // `timeout` elapses, matching spec §5's "scripting 30s" bound.
    let mut child = Command::new("osascript")
        .arg("-e")
        .arg(snippet)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| NexusError::AdapterFailed(format!("failed to spawn osascript: {e}")))?;

    let start = std::time::Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    return Err(NexusError::Timeout(timeout));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => return Err(NexusError::AdapterFailed(format!("osascript wait failed: {e}"))),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| NexusError::AdapterFailed(format!("osascript output failed: {e}")))?;

    Ok(ScriptOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(not(target_os = "macos"))]
fn run_osascript(_snippet: &str, _timeout: Duration) -> Result<ScriptOutput> {
    Err(NexusError::UnsupportedCapability("applescript".into()))
}

/// Atomic clipboard paste: save the current clipboard, write the new text, synthesize
/// cmd+v, settle, then restore the original clipboard (spec §4.5, §5, §9 open question on
/// the 300ms settle being an empirical lower bound).
pub fn atomic_paste(text: &str, input: &dyn super::InputSynthesis, config: &Config) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| NexusError::AdapterFailed(format!("clipboard open failed: {e}")))?;

    let saved = clipboard.get_text().ok();

    clipboard
        .set_text(text.to_string())
        .map_err(|e| NexusError::AdapterFailed(format!("clipboard write failed: {e}")))?;

    input.hotkey(
        &[super::input::key_alias_to_code("v").unwrap_or(9)],
        super::Modifiers {
            cmd: true,
            ..Default::default()
        },
    )?;

    std::thread::sleep(config.atomic_paste_settle());

    if let Some(original) = saved {
        let _ = clipboard.set_text(original);
    }
    Ok(())
}
