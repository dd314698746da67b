//! Label translation table (spec §4.8): app-then-global lookup with a `_global` sentinel app
//! key, identity mappings never stored, hit counts tracked per mapping (§3 `(app, target) ->
//! (mapped, hits, updated)`).

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

const GLOBAL_APP: &str = "_global";

pub struct LabelEntry {
    pub raw_label: String,
    pub learned_label: String,
    pub hits: i64,
}

/// App-specific lookup first, then the `_global` aggregate (spec §4.8 "app-then-global
/// lookup").
pub fn lookup(conn: &Connection, app: &str, raw_label: &str) -> Result<Option<String>> {
    if let Some(label) = lookup_one(conn, app, raw_label)? {
        return Ok(Some(label));
    }
    lookup_one(conn, GLOBAL_APP, raw_label)
}

fn lookup_one(conn: &Connection, app: &str, raw_label: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT learned_label FROM labels WHERE app = ?1 AND raw_label = ?2",
            params![app, raw_label],
            |r| r.get(0),
        )
        .optional()?)
}

/// Learns `raw_label -> learned_label` for `app` and the `_global` aggregate. Identity
/// mappings (label already equal to itself) are never stored — they carry no information
/// (spec §4.8). Repeated observations of the same mapping bump `hits` rather than
/// duplicating the row.
pub fn learn(conn: &Connection, app: &str, raw_label: &str, learned_label: &str) -> Result<()> {
    if raw_label.eq_ignore_ascii_case(learned_label) {
        return Ok(());
    }
    upsert_one(conn, app, raw_label, learned_label)?;
    if app != GLOBAL_APP {
        upsert_one(conn, GLOBAL_APP, raw_label, learned_label)?;
    }
    Ok(())
}

fn upsert_one(conn: &Connection, app: &str, raw_label: &str, learned_label: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    conn.execute(
        "INSERT INTO labels (app, raw_label, learned_label, hits, updated) VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT(app, raw_label) DO UPDATE SET
            learned_label = excluded.learned_label, hits = hits + 1, updated = excluded.updated",
        params![app, raw_label, learned_label, now],
    )?;
    Ok(())
}

/// All label mappings for `app`, ordered by descending hits, for §4.8's "hints for see()"
/// learning summary.
pub fn all_for_app(conn: &Connection, app: &str) -> Result<Vec<LabelEntry>> {
    let mut stmt = conn.prepare(
        "SELECT raw_label, learned_label, hits FROM labels WHERE app = ?1 ORDER BY hits DESC",
    )?;
    let rows = stmt
        .query_map(params![app], |r| {
            Ok(LabelEntry {
                raw_label: r.get(0)?,
                learned_label: r.get(1)?,
                hits: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts label mappings: app-specific (`exclude_global`) or `_global`-only, for the
/// `remember(op="stats")` summary (spec §4.8).
pub fn count(conn: &Connection, global_only: bool) -> Result<i64> {
    let sql = if global_only {
        "SELECT COUNT(*) FROM labels WHERE app = '_global'"
    } else {
        "SELECT COUNT(*) FROM labels WHERE app != '_global'"
    };
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn app_specific_beats_global() {
        let store = Store::open_in_memory().unwrap();
        store.label_learn(GLOBAL_APP, "btn1", "Save").unwrap();
        store.label_learn("Demo", "btn1", "Submit").unwrap();
        assert_eq!(store.label_lookup("Demo", "btn1").unwrap(), Some("Submit".to_string()));
        assert_eq!(store.label_lookup("Other", "btn1").unwrap(), Some("Save".to_string()));
    }

    #[test]
    fn identity_mapping_is_not_stored() {
        let store = Store::open_in_memory().unwrap();
        store.label_learn("Demo", "Save", "Save").unwrap();
        assert_eq!(store.label_lookup("Demo", "Save").unwrap(), None);
    }

    #[test]
    fn repeated_learn_increments_hits() {
        let store = Store::open_in_memory().unwrap();
        store.label_learn("Demo", "save", "guardar").unwrap();
        store.label_learn("Demo", "save", "guardar").unwrap();
        let entries = store.label_all_for_app("Demo").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hits, 2);
    }

    #[test]
    fn learn_also_updates_global_aggregate() {
        let store = Store::open_in_memory().unwrap();
        store.label_learn("Demo", "save", "guardar").unwrap();
        assert_eq!(store.label_lookup("Other", "save").unwrap(), Some("guardar".to_string()));
    }
}
