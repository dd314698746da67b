//! `workflows` + `workflow_steps` tables (spec §6): a saved chain of actions, optionally
//! gated per-step by an expected layout fingerprint.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub step_num: u32,
    pub action: String,
    pub expected_hash: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub app: Option<String>,
    pub success_count: u64,
    pub fail_count: u64,
    pub steps: Vec<WorkflowStep>,
}

pub fn create(conn: &Connection, name: &str, app: Option<&str>) -> Result<i64> {
    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    conn.execute(
        "INSERT INTO workflows (name, app, created, updated) VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(name) DO UPDATE SET app = excluded.app, updated = excluded.updated",
        params![name, app, now],
    )?;
    Ok(conn.query_row("SELECT id FROM workflows WHERE name = ?1", params![name], |r| r.get(0))?)
}

pub fn add_step(
    conn: &Connection,
    workflow_id: i64,
    step_num: u32,
    action: &str,
    expected_hash: Option<&str>,
    timeout_ms: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO workflow_steps (workflow_id, step_num, action, expected_hash, timeout_ms)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(workflow_id, step_num) DO UPDATE SET
            action = excluded.action, expected_hash = excluded.expected_hash, timeout_ms = excluded.timeout_ms",
        params![workflow_id, step_num, action, expected_hash, timeout_ms as i64],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<Workflow>> {
    let row = conn
        .query_row(
            "SELECT id, name, app, success_count, fail_count FROM workflows WHERE name = ?1",
            params![name],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, i64>(3)? as u64,
                    r.get::<_, i64>(4)? as u64,
                ))
            },
        )
        .optional()?;
    let Some((id, name, app, success_count, fail_count)) = row else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT step_num, action, expected_hash, timeout_ms FROM workflow_steps
         WHERE workflow_id = ?1 ORDER BY step_num",
    )?;
    let steps = stmt
        .query_map(params![id], |r| {
            Ok(WorkflowStep {
                step_num: r.get::<_, i64>(0)? as u32,
                action: r.get(1)?,
                expected_hash: r.get(2)?,
                timeout_ms: r.get::<_, i64>(3)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Some(Workflow { id, name, app, success_count, fail_count, steps }))
}

pub fn list(conn: &Connection) -> Result<Vec<Workflow>> {
    let mut stmt = conn.prepare("SELECT name FROM workflows ORDER BY name")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);
    names
        .into_iter()
        .filter_map(|name| get(conn, &name).transpose())
        .collect()
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM workflows WHERE name = ?1", params![name])?;
    Ok(())
}

pub fn record_outcome(conn: &Connection, name: &str, ok: bool) -> Result<()> {
    let col = if ok { "success_count" } else { "fail_count" };
    conn.execute(
        &format!("UPDATE workflows SET {col} = {col} + 1 WHERE name = ?1"),
        params![name],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn steps_cascade_delete_with_workflow() {
        let store = Store::open_in_memory().unwrap();
        let id = store.workflow_create("morning-setup", Some("Mail")).unwrap();
        store.workflow_add_step(id, 1, "open Mail", None, 5000).unwrap();
        store.workflow_add_step(id, 2, "click Compose", None, 5000).unwrap();
        assert_eq!(store.workflow_get("morning-setup").unwrap().unwrap().steps.len(), 2);
        store.workflow_delete("morning-setup").unwrap();
        assert!(store.workflow_get("morning-setup").unwrap().is_none());
    }

    #[test]
    fn outcome_counters_increment() {
        let store = Store::open_in_memory().unwrap();
        store.workflow_create("w", None).unwrap();
        store.workflow_record_outcome("w", true).unwrap();
        store.workflow_record_outcome("w", false).unwrap();
        let w = store.workflow_get("w").unwrap().unwrap();
        assert_eq!((w.success_count, w.fail_count), (1, 1));
    }
}
