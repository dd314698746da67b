//! `memory`, `actions`, and `method_stats` tables (spec §4.8, §6).

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

const ACTIONS_CAP: i64 = 500;

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM memory WHERE key = ?1", params![key], |r| r.get(0))
        .optional()?)
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO memory (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM memory WHERE key = ?1", params![key])?;
    Ok(())
}

pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM memory", [])?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM memory ORDER BY key")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Appends an action outcome with its full learning context (intent text, parsed
/// verb/target, resolution method, and the learned label substituted for the target, if
/// any), then FIFO-trims the table to the 500-row cap (spec §4.8, §6).
#[allow(clippy::too_many_arguments)]
pub fn record_action(
    conn: &Connection,
    app: &str,
    verb: &str,
    ok: bool,
    intent: Option<&str>,
    target: Option<&str>,
    method: Option<&str>,
    via_label: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    conn.execute(
        "INSERT INTO actions (app, verb, ok, ts, intent, target, method, via_label)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![app, verb, ok as i64, now, intent, target, method, via_label],
    )?;
    conn.execute(
        "DELETE FROM actions WHERE id NOT IN (SELECT id FROM actions ORDER BY id DESC LIMIT ?1)",
        params![ACTIONS_CAP],
    )?;
    Ok(())
}

pub fn action_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM actions", [], |r| r.get(0))?)
}

/// Distinct apps with at least one recorded method-resolution stat, for the
/// `remember(op="stats")` "apps tracked" figure (spec §4.8).
pub fn method_app_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(DISTINCT app) FROM method_stats", [], |r| r.get(0))?)
}

pub fn record_method_stat(conn: &Connection, app: &str, method: &str, ok: bool) -> Result<()> {
    if ok {
        conn.execute(
            "INSERT INTO method_stats (app, method, ok_count, fail_count) VALUES (?1, ?2, 1, 0)
             ON CONFLICT(app, method) DO UPDATE SET ok_count = ok_count + 1",
            params![app, method],
        )?;
    } else {
        conn.execute(
            "INSERT INTO method_stats (app, method, ok_count, fail_count) VALUES (?1, ?2, 0, 1)
             ON CONFLICT(app, method) DO UPDATE SET fail_count = fail_count + 1",
            params![app, method],
        )?;
    }
    Ok(())
}

/// Returns `(ok_count, fail_count)`, surfaced by callers only once the sample count is ≥3
/// (spec §4.8) — that threshold check lives at the call site, not here.
pub fn get_method_stat(conn: &Connection, app: &str, method: &str) -> Result<Option<(u64, u64)>> {
    Ok(conn
        .query_row(
            "SELECT ok_count, fail_count FROM method_stats WHERE app = ?1 AND method = ?2",
            params![app, method],
            |r| Ok((r.get::<_, i64>(0)? as u64, r.get::<_, i64>(1)? as u64)),
        )
        .optional()?)
}

/// Every method's `(method, ok_count, fail_count)` recorded for `app`, for the
/// `hints_for_app`-equivalent "Action methods: ..." summary (spec §4.8).
pub fn method_stats_for_app(conn: &Connection, app: &str) -> Result<Vec<(String, u64, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT method, ok_count, fail_count FROM method_stats WHERE app = ?1 ORDER BY method",
    )?;
    let rows = stmt
        .query_map(params![app], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u64, r.get::<_, i64>(2)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn actions_trim_to_cap() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..510 {
            let verb = format!("click{i}");
            store.action_record("Demo", &verb, true, None, None, None, None).unwrap();
        }
        let count: i64 = store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM actions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, ACTIONS_CAP);
    }

    #[test]
    fn method_stat_accumulates() {
        let store = Store::open_in_memory().unwrap();
        store.method_stat_record("Demo", "ax_find", true).unwrap();
        store.method_stat_record("Demo", "ax_find", true).unwrap();
        store.method_stat_record("Demo", "ax_find", false).unwrap();
        assert_eq!(store.method_stat_get("Demo", "ax_find").unwrap(), Some((2, 1)));
    }
}
