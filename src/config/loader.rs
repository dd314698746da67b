use super::types::Config;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nexus")
        .join("config.json")
}

/// Loads the process-wide config once, from the default path. Subsequent calls return the
/// cached instance. Tests that need isolation should use [`load_from`] directly instead of
/// going through the singleton.
pub fn load() -> &'static Config {
    CONFIG.get_or_init(|| load_from(&default_config_path()).unwrap_or_default())
}

/// Loads a config from an explicit path, applying environment-variable overrides on top.
/// Kept separate from the singleton so tests can point at a temp directory (mirrors the
/// teacher's injectable-path convention for its own config loader).
pub fn load_from(path: &Path) -> Option<Config> {
    let mut config = if path.exists() {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).unwrap_or_default()
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config);
    Some(config)
}

fn apply_env_overrides(config: &mut Config) {
    macro_rules! env_override {
        ($field:ident, $env:expr) => {
            if let Ok(v) = std::env::var($env) {
                if let Ok(parsed) = v.parse() {
                    config.$field = parsed;
                }
            }
        };
    }

    env_override!(auto_dismiss_safe_dialogs, "NEXUS_AUTO_DISMISS_SAFE_DIALOGS");
    env_override!(cache_ttl_ms, "NEXUS_CACHE_TTL_MS");
    env_override!(cache_capacity, "NEXUS_CACHE_CAPACITY");
    env_override!(journal_capacity, "NEXUS_JOURNAL_CAPACITY");
    env_override!(circuit_breaker_threshold, "NEXUS_CIRCUIT_BREAKER_THRESHOLD");
    env_override!(circuit_breaker_window_s, "NEXUS_CIRCUIT_BREAKER_WINDOW_S");
    env_override!(atomic_paste_settle_ms, "NEXUS_ATOMIC_PASTE_SETTLE_MS");
    env_override!(browser_bridge_port, "NEXUS_BROWSER_BRIDGE_PORT");
    env_override!(log_level, "NEXUS_LOG_LEVEL");
    env_override!(perceive_max_elements, "NEXUS_PERCEIVE_MAX_ELEMENTS");
    env_override!(perceive_max_menu_items, "NEXUS_PERCEIVE_MAX_MENU_ITEMS");
    env_override!(perceive_max_windows, "NEXUS_PERCEIVE_MAX_WINDOWS");

    if let Ok(path) = std::env::var("NEXUS_DB_PATH") {
        config.db_path = Some(path);
    }
}
