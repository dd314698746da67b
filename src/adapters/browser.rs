//! Browser bridge: drives Chrome/Chromium over the Chrome DevTools Protocol for the `via`
//! browser-automation path (spec §4.7 "BrowserOp").
//!
//! Grounded on `original_source/nexus/sense/web.py`: discover the active tab via the
//! `/json` HTTP endpoint, open a websocket to its `webSocketDebuggerUrl`, and issue
//! id-correlated JSON-RPC requests (`Runtime.evaluate`, `Page.navigate`,
//! `Page.bringToFront`). Neither the teacher nor any other example repo carries a websocket
//! crate, so `tungstenite` is added fresh for this adapter (see DESIGN.md); `ureq`, already
//! in the teacher's stack, covers the discovery HTTP call.

use crate::config::Config;
use crate::error::{NexusError, Result};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tungstenite::{connect, Message, WebSocket};

#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    target_type: String,
    url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

pub struct BrowserBridge {
    port: u16,
    connect_timeout: Duration,
    next_id: AtomicU64,
    socket: Mutex<Option<WebSocket<std::net::TcpStream>>>,
}

impl BrowserBridge {
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.browser_bridge_port,
            connect_timeout: Duration::from_millis(config.browser_bridge_connect_timeout_ms),
            next_id: AtomicU64::new(1),
            socket: Mutex::new(None),
        }
    }

    /// Launches Chrome with remote debugging enabled if no instance answers on the
    /// configured port, then waits (bounded by `connect_timeout`) for it to come up.
    pub fn ensure_running(&self) -> Result<()> {
        if self.list_targets().is_ok() {
            return Ok(());
        }
        launch_chrome(self.port)?;

        let deadline = std::time::Instant::now() + self.connect_timeout;
        while std::time::Instant::now() < deadline {
            if self.list_targets().is_ok() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        Err(NexusError::Timeout(self.connect_timeout))
    }

    fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        let url = format!("http://127.0.0.1:{}/json", self.port);
        let body = ureq::get(&url)
            .timeout(self.connect_timeout)
            .call()
            .map_err(|e| NexusError::AdapterFailed(format!("CDP discovery failed: {e}")))?
            .into_string()
            .map_err(|e| NexusError::AdapterFailed(format!("CDP discovery body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| NexusError::AdapterFailed(format!("CDP discovery parse: {e}")))
    }

    /// Connects to the first page-type target, preferring one already on `prefer_url` when
    /// given (used to re-attach to a tab already navigated to the target site).
    pub fn attach(&self, prefer_url_substring: Option<&str>) -> Result<()> {
        let targets = self.list_targets()?;
        let page = targets
            .iter()
            .filter(|t| t.target_type == "page")
            .find(|t| {
                prefer_url_substring
                    .map(|needle| t.url.contains(needle))
                    .unwrap_or(true)
            })
            .or_else(|| targets.iter().find(|t| t.target_type == "page"))
            .ok_or_else(|| NexusError::AdapterFailed("no browser page target".into()))?;

        let ws_url = page
            .ws_url
            .clone()
            .ok_or_else(|| NexusError::AdapterFailed("target has no debugger url".into()))?;

        let (socket, _) = connect(&ws_url)
            .map_err(|e| NexusError::AdapterFailed(format!("CDP websocket connect failed: {e}")))?;
        *self.socket.lock().unwrap() = Some(socket);
        Ok(())
    }

    fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::json!({ "id": id, "method": method, "params": params });

        let mut guard = self.socket.lock().unwrap();
        let socket = guard
            .as_mut()
            .ok_or_else(|| NexusError::AdapterFailed("browser bridge not attached".into()))?;

        socket
            .send(Message::Text(request.to_string()))
            .map_err(|e| NexusError::AdapterFailed(format!("CDP send failed: {e}")))?;

        loop {
            let msg = socket
                .read()
                .map_err(|e| NexusError::AdapterFailed(format!("CDP read failed: {e}")))?;
            let Message::Text(text) = msg else { continue };
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| NexusError::AdapterFailed(format!("CDP response parse: {e}")))?;
            if value.get("id").and_then(|v| v.as_u64()) == Some(id) {
                if let Some(error) = value.get("error") {
                    return Err(NexusError::AdapterFailed(format!("CDP error: {error}")));
                }
                return Ok(value.get("result").cloned().unwrap_or(serde_json::Value::Null));
            }
            // Not our response (a CDP event notification) — keep reading.
        }
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.call("Page.navigate", serde_json::json!({ "url": url }))?;
        Ok(())
    }

    pub fn bring_to_front(&self) -> Result<()> {
        self.call("Page.bringToFront", serde_json::json!({}))?;
        Ok(())
    }

    pub fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self.call(
            "Runtime.evaluate",
            serde_json::json!({ "expression": expression, "returnByValue": true }),
        )?;
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(target_os = "macos")]
fn launch_chrome(port: u16) -> Result<()> {
    std::process::Command::new("open")
        .args([
            "-a",
            "Google Chrome",
            "--args",
            &format!("--remote-debugging-port={port}"),
        ])
        .spawn()
        .map_err(|e| NexusError::AdapterFailed(format!("failed to launch chrome: {e}")))?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn launch_chrome(_port: u16) -> Result<()> {
    Err(NexusError::UnsupportedCapability("browser launch".into()))
}
