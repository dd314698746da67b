//! `graph_nodes` + `graph_edges` tables (spec §4.12): the navigation graph built from
//! fingerprint-changing successful actions.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub hash: String,
    pub app: String,
    pub label: String,
    pub first_seen: f64,
    pub last_seen: f64,
    pub visit_count: u64,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub from_hash: String,
    pub to_hash: String,
    pub action: String,
    pub success_count: u64,
    pub fail_count: u64,
    pub avg_elapsed: f64,
}

pub fn upsert_node(conn: &Connection, hash: &str, app: &str, label: &str, now_s: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO graph_nodes (hash, app, label, first_seen, last_seen, visit_count)
         VALUES (?1, ?2, ?3, ?4, ?4, 1)
         ON CONFLICT(hash) DO UPDATE SET last_seen = excluded.last_seen, visit_count = visit_count + 1",
        params![hash, app, label, now_s],
    )?;
    Ok(())
}

/// Upserts a directed edge, incrementing the success/fail counter and updating the running
/// average elapsed time via Welford-style incremental mean (spec §4.12).
pub fn upsert_edge(conn: &Connection, from_hash: &str, to_hash: &str, action: &str, ok: bool, elapsed_s: f64, now_s: f64) -> Result<()> {
    let existing = conn
        .query_row(
            "SELECT success_count, fail_count, avg_elapsed FROM graph_edges
             WHERE from_hash = ?1 AND to_hash = ?2 AND action = ?3",
            params![from_hash, to_hash, action],
            |r| Ok((r.get::<_, i64>(0)? as u64, r.get::<_, i64>(1)? as u64, r.get::<_, f64>(2)?)),
        )
        .optional()?;

    let (success_count, fail_count, avg_elapsed) = match existing {
        Some((s, f, avg)) => {
            let total = s + f;
            let new_avg = (avg * total as f64 + elapsed_s) / (total + 1) as f64;
            (s + ok as u64, f + (!ok) as u64, new_avg)
        }
        None => (ok as u64, (!ok) as u64, elapsed_s),
    };

    conn.execute(
        "INSERT INTO graph_edges (from_hash, to_hash, action, success_count, fail_count, avg_elapsed, last_used)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(from_hash, to_hash, action) DO UPDATE SET
            success_count = excluded.success_count,
            fail_count = excluded.fail_count,
            avg_elapsed = excluded.avg_elapsed,
            last_used = excluded.last_used",
        params![from_hash, to_hash, action, success_count, fail_count, avg_elapsed, now_s],
    )?;
    Ok(())
}

pub fn edges_from(conn: &Connection, hash: &str) -> Result<Vec<GraphEdge>> {
    let mut stmt = conn.prepare(
        "SELECT from_hash, to_hash, action, success_count, fail_count, avg_elapsed
         FROM graph_edges WHERE from_hash = ?1",
    )?;
    let rows = stmt
        .query_map(params![hash], |r| {
            Ok(GraphEdge {
                from_hash: r.get(0)?,
                to_hash: r.get(1)?,
                action: r.get(2)?,
                success_count: r.get::<_, i64>(3)? as u64,
                fail_count: r.get::<_, i64>(4)? as u64,
                avg_elapsed: r.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn node(conn: &Connection, hash: &str) -> Result<Option<GraphNode>> {
    Ok(conn
        .query_row(
            "SELECT hash, app, label, first_seen, last_seen, visit_count FROM graph_nodes WHERE hash = ?1",
            params![hash],
            |r| {
                Ok(GraphNode {
                    hash: r.get(0)?,
                    app: r.get(1)?,
                    label: r.get(2)?,
                    first_seen: r.get(3)?,
                    last_seen: r.get(4)?,
                    visit_count: r.get::<_, i64>(5)? as u64,
                })
            },
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn node_visit_count_increments() {
        let store = Store::open_in_memory().unwrap();
        store.graph_upsert_node("fp1", "Demo", "Home", 1.0).unwrap();
        store.graph_upsert_node("fp1", "Demo", "Home", 2.0).unwrap();
        let node = store.graph_node("fp1").unwrap().unwrap();
        assert_eq!(node.visit_count, 2);
    }

    #[test]
    fn edge_counters_and_running_average() {
        let store = Store::open_in_memory().unwrap();
        store.graph_upsert_node("fp1", "Demo", "Home", 1.0).unwrap();
        store.graph_upsert_node("fp2", "Demo", "Settings", 1.0).unwrap();
        store.graph_upsert_edge("fp1", "fp2", "click Settings", true, 1.0, 1.0).unwrap();
        store.graph_upsert_edge("fp1", "fp2", "click Settings", true, 3.0, 2.0).unwrap();
        let edges = store.graph_edges_from("fp1").unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].success_count, 2);
        assert_eq!(edges[0].avg_elapsed, 2.0);
    }
}
