use serde::{Deserialize, Serialize};
use std::time::Duration;

/// All tunables referenced by name elsewhere in the spec. Every field has a default that
/// matches the numeric constants named in spec §4/§5, and can be overridden by an
/// environment variable `NEXUS_<FIELD_UPPER>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// §4.7 before_act: auto-click known-safe dialog buttons when true.
    pub auto_dismiss_safe_dialogs: bool,

    /// §4.2/§4.9: perception-cache and spatial-cache TTL in milliseconds.
    pub cache_ttl_ms: u64,
    /// §3/§4.9: spatial-cache and perception-cache capacity in processes.
    pub cache_capacity: usize,

    /// §3/§4.9: action journal ring-buffer capacity.
    pub journal_capacity: usize,

    /// §4.7 circuit breaker: failure threshold and rolling window.
    pub circuit_breaker_threshold: usize,
    pub circuit_breaker_window_s: u64,

    /// §4.5 type(): clipboard atomic-paste settle, an empirical lower bound (§9 open
    /// question) kept overridable here.
    pub atomic_paste_settle_ms: u64,

    /// §4.2: OCR layer runs only when the tree layer yields fewer labeled elements than this.
    pub ocr_min_elements_threshold: usize,

    /// §4.1/§10.8: browser-bridge (CDP) port and connect timeout.
    pub browser_bridge_port: u16,
    pub browser_bridge_connect_timeout_ms: u64,

    /// §5: scripting/clipboard/wait timeouts.
    pub scripting_timeout_s: u64,
    pub wait_default_timeout_s: u64,
    pub wait_max_s: u64,
    pub scroll_until_max_iterations: u32,

    /// §4.8 fail→success correlation window.
    pub label_learning_window_s: u64,

    /// §4.3: max elements shown in a full-tree `perceive` listing before truncation
    /// ("... and N more (use query= to search)").
    pub perceive_max_elements: usize,

    /// §4.3: max menu items shown when `perceive(menus=true)`, depth-limited to 2 levels.
    pub perceive_max_menu_items: usize,

    /// §4.3: max windows listed in the `perceive` header before truncation.
    pub perceive_max_windows: usize,

    /// §6: embedded-DB path. Defaults under `~/.nexus`.
    pub db_path: Option<String>,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_dismiss_safe_dialogs: false,
            cache_ttl_ms: 3_000,
            cache_capacity: 10,
            journal_capacity: 50,
            circuit_breaker_threshold: 3,
            circuit_breaker_window_s: 30,
            atomic_paste_settle_ms: 300,
            ocr_min_elements_threshold: 5,
            browser_bridge_port: 9222,
            browser_bridge_connect_timeout_ms: 3_000,
            scripting_timeout_s: 30,
            wait_default_timeout_s: 10,
            wait_max_s: 30,
            scroll_until_max_iterations: 20,
            label_learning_window_s: 30,
            perceive_max_elements: 80,
            perceive_max_menu_items: 150,
            perceive_max_windows: 8,
            db_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn circuit_breaker_window(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_window_s)
    }

    pub fn atomic_paste_settle(&self) -> Duration {
        Duration::from_millis(self.atomic_paste_settle_ms)
    }

    pub fn label_learning_window(&self) -> Duration {
        Duration::from_secs(self.label_learning_window_s)
    }
}
