//! Embedded relational store: memory, labels, actions, method stats, workflows, the
//! navigation graph, and recorded routes (spec §4.8, §6). Grounded on `rusqlite` usage
//! pattern from the rest of the pack (no direct teacher counterpart — the teacher has no
//! durable store beyond its own scriptlet cache, so this module is enriched from
//! `original_source/nexus/store.py`'s table layout).
//!
//! One [`Store`] per process, holding a single `rusqlite::Connection` behind a module-level
//! lock (spec §5: "writes serialized under a module-level lock with WAL journaling and
//! foreign keys enabled").

mod graph;
mod labels;
mod memory;
mod routes;
mod schema;
mod workflows;

pub use graph::{GraphEdge, GraphNode};
pub use labels::LabelEntry;
pub use routes::{RecordedStep, RecordedStepKind, Route};
pub use workflows::{Workflow, WorkflowStep};

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, enables WAL + foreign keys, and
    /// creates the schema idempotently. Runs the one-shot legacy-file-import migration if a
    /// legacy state file is found alongside.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::create_all(&conn)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate_legacy_if_present(path);
        Ok(store)
    }

    /// Opens an in-memory database, used by tests that want isolation without touching disk.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::create_all(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nexus")
            .join("nexus.db")
    }

    /// One-shot import of a legacy JSON state file, if present next to `path`, renaming it to
    /// `<name>.imported` on success so it never runs twice (spec §5 "one-shot legacy-state
    /// migration renames the source file on success").
    fn migrate_legacy_if_present(&self, db_path: &Path) {
        let legacy = db_path.with_extension("legacy.json");
        if !legacy.exists() {
            return;
        }
        if let Ok(text) = std::fs::read_to_string(&legacy) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                if let Some(map) = value.get("memory").and_then(|v| v.as_object()) {
                    for (key, v) in map {
                        let _ = memory::set(&self.conn.lock(), key, &v.to_string());
                    }
                }
                let _ = std::fs::rename(&legacy, legacy.with_extension("imported"));
            }
        }
    }

    pub fn memory_get(&self, key: &str) -> Result<Option<String>> {
        memory::get(&self.conn.lock(), key)
    }

    pub fn memory_set(&self, key: &str, value: &str) -> Result<()> {
        memory::set(&self.conn.lock(), key, value)
    }

    pub fn memory_delete(&self, key: &str) -> Result<()> {
        memory::delete(&self.conn.lock(), key)
    }

    pub fn memory_list(&self) -> Result<Vec<(String, String)>> {
        memory::list(&self.conn.lock())
    }

    /// Deletes every memory key, for `remember(op="clear")` (spec §6).
    pub fn memory_clear(&self) -> Result<()> {
        memory::clear(&self.conn.lock())
    }

    /// App-then-global label lookup (spec §4.8): never stores identity mappings.
    pub fn label_lookup(&self, app: &str, raw_label: &str) -> Result<Option<String>> {
        labels::lookup(&self.conn.lock(), app, raw_label)
    }

    pub fn label_learn(&self, app: &str, raw_label: &str, learned_label: &str) -> Result<()> {
        labels::learn(&self.conn.lock(), app, raw_label, learned_label)
    }

    /// All learned labels for `app`, ordered by descending hits (spec §4.8 "hints for
    /// see()").
    pub fn label_all_for_app(&self, app: &str) -> Result<Vec<LabelEntry>> {
        labels::all_for_app(&self.conn.lock(), app)
    }

    /// Count of app-specific label mappings (`global_only = false`) or `_global` aggregate
    /// mappings (`global_only = true`), for `remember(op="stats")`.
    pub fn label_count(&self, global_only: bool) -> Result<i64> {
        labels::count(&self.conn.lock(), global_only)
    }

    /// Records an action outcome with its full learning context, FIFO-trimming the table to
    /// 500 rows (spec §4.8, §6).
    #[allow(clippy::too_many_arguments)]
    pub fn action_record(
        &self,
        app: &str,
        verb: &str,
        ok: bool,
        intent: Option<&str>,
        target: Option<&str>,
        method: Option<&str>,
        via_label: Option<&str>,
    ) -> Result<()> {
        memory::record_action(&self.conn.lock(), app, verb, ok, intent, target, method, via_label)
    }

    pub fn action_count(&self) -> Result<i64> {
        memory::action_count(&self.conn.lock())
    }

    pub fn method_app_count(&self) -> Result<i64> {
        memory::method_app_count(&self.conn.lock())
    }

    /// Per-(app,method) success/fail counters, surfaced once a method has ≥3 samples
    /// (spec §4.8).
    pub fn method_stat_record(&self, app: &str, method: &str, ok: bool) -> Result<()> {
        memory::record_method_stat(&self.conn.lock(), app, method, ok)
    }

    pub fn method_stat_get(&self, app: &str, method: &str) -> Result<Option<(u64, u64)>> {
        memory::get_method_stat(&self.conn.lock(), app, method)
    }

    /// Every recorded method stat for `app`, for the learning-hint summary.
    pub fn method_stats_for_app(&self, app: &str) -> Result<Vec<(String, u64, u64)>> {
        memory::method_stats_for_app(&self.conn.lock(), app)
    }

    pub fn workflow_create(&self, name: &str, app: Option<&str>) -> Result<i64> {
        workflows::create(&self.conn.lock(), name, app)
    }

    pub fn workflow_add_step(&self, workflow_id: i64, step_num: u32, action: &str, expected_hash: Option<&str>, timeout_ms: u64) -> Result<()> {
        workflows::add_step(&self.conn.lock(), workflow_id, step_num, action, expected_hash, timeout_ms)
    }

    pub fn workflow_get(&self, name: &str) -> Result<Option<Workflow>> {
        workflows::get(&self.conn.lock(), name)
    }

    pub fn workflow_list(&self) -> Result<Vec<Workflow>> {
        workflows::list(&self.conn.lock())
    }

    pub fn workflow_delete(&self, name: &str) -> Result<()> {
        workflows::delete(&self.conn.lock(), name)
    }

    pub fn workflow_record_outcome(&self, name: &str, ok: bool) -> Result<()> {
        workflows::record_outcome(&self.conn.lock(), name, ok)
    }

    pub fn route_create(&self, name: &str, app: Option<&str>, duration_ms: u64, steps: &[RecordedStep]) -> Result<i64> {
        routes::create(&self.conn.lock(), name, app, duration_ms, steps)
    }

    pub fn route_get(&self, name: &str) -> Result<Option<Route>> {
        routes::get(&self.conn.lock(), name)
    }

    pub fn route_list(&self) -> Result<Vec<Route>> {
        routes::list(&self.conn.lock())
    }

    pub fn route_delete(&self, name: &str) -> Result<()> {
        routes::delete(&self.conn.lock(), name)
    }

    /// Upserts a graph node, bumping `visit_count` and `last_seen` (spec §4.12).
    pub fn graph_upsert_node(&self, hash: &str, app: &str, label: &str, now_s: f64) -> Result<()> {
        graph::upsert_node(&self.conn.lock(), hash, app, label, now_s)
    }

    /// Upserts a directed edge, bumping success/fail counters and the running average
    /// elapsed time (spec §4.12).
    pub fn graph_upsert_edge(&self, from_hash: &str, to_hash: &str, action: &str, ok: bool, elapsed_s: f64, now_s: f64) -> Result<()> {
        graph::upsert_edge(&self.conn.lock(), from_hash, to_hash, action, ok, elapsed_s, now_s)
    }

    pub fn graph_edges_from(&self, hash: &str) -> Result<Vec<GraphEdge>> {
        graph::edges_from(&self.conn.lock(), hash)
    }

    pub fn graph_node(&self, hash: &str) -> Result<Option<GraphNode>> {
        graph::node(&self.conn.lock(), hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store.memory_set("theme", "dark").unwrap();
        assert_eq!(store.memory_get("theme").unwrap(), Some("dark".to_string()));
        store.memory_delete("theme").unwrap();
        assert_eq!(store.memory_get("theme").unwrap(), None);
    }

    #[test]
    fn legacy_migration_renames_source() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nexus.db");
        let legacy_path = db_path.with_extension("legacy.json");
        std::fs::write(&legacy_path, r#"{"memory": {"theme": "\"dark\""}}"#).unwrap();
        let store = Store::open(&db_path).unwrap();
        assert_eq!(store.memory_get("theme").unwrap(), Some("\"dark\"".to_string()));
        assert!(!legacy_path.exists());
        assert!(legacy_path.with_extension("imported").exists());
    }
}
