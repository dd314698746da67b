//! `routes` + `route_steps` tables (spec §3, §6): a recorded raw-input sequence replayable
//! via the three-tier locator (`via::player`).

use crate::adapters::Modifiers;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordedStepKind {
    Click,
    Key,
    Scroll,
}

impl RecordedStepKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Key => "key",
            Self::Scroll => "scroll",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "key" => Self::Key,
            "scroll" => Self::Scroll,
            _ => Self::Click,
        }
    }
}

/// Per-step schema (spec §6 "Recorded-route step schema").
#[derive(Debug, Clone, Serialize)]
pub struct RecordedStep {
    pub step_num: u32,
    pub ts_offset_ms: u64,
    pub kind: RecordedStepKind,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub rel_x: Option<f64>,
    pub rel_y: Option<f64>,
    pub window: Option<(f64, f64, f64, f64)>,
    pub button: Option<String>,
    pub key_code: Option<u16>,
    pub key_label: Option<String>,
    pub modifiers: Modifiers,
    pub ax_role: Option<String>,
    pub ax_label: Option<String>,
    pub pid: Option<i32>,
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub app: Option<String>,
    pub duration_ms: u64,
    pub steps: Vec<RecordedStep>,
}

pub fn create(conn: &Connection, name: &str, app: Option<&str>, duration_ms: u64, steps: &[RecordedStep]) -> Result<i64> {
    conn.execute("DELETE FROM routes WHERE name = ?1", params![name])?;
    conn.execute(
        "INSERT INTO routes (name, app, duration_ms, step_count) VALUES (?1, ?2, ?3, ?4)",
        params![name, app, duration_ms as i64, steps.len() as i64],
    )?;
    let id = conn.last_insert_rowid();
    for step in steps {
        conn.execute(
            "INSERT INTO route_steps (
                route_id, step_num, ts_offset_ms, kind, x, y, rel_x, rel_y,
                window_x, window_y, window_w, window_h, button, key_code, key_label,
                mod_cmd, mod_shift, mod_ctrl, mod_opt, ax_role, ax_label, pid, app_name
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
            params![
                id,
                step.step_num,
                step.ts_offset_ms as i64,
                step.kind.as_str(),
                step.x,
                step.y,
                step.rel_x,
                step.rel_y,
                step.window.map(|w| w.0),
                step.window.map(|w| w.1),
                step.window.map(|w| w.2),
                step.window.map(|w| w.3),
                step.button,
                step.key_code,
                step.key_label,
                step.modifiers.cmd as i64,
                step.modifiers.shift as i64,
                step.modifiers.ctrl as i64,
                step.modifiers.opt as i64,
                step.ax_role,
                step.ax_label,
                step.pid,
                step.app_name,
            ],
        )?;
    }
    Ok(id)
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<Route>> {
    let row = conn
        .query_row(
            "SELECT id, name, app, duration_ms FROM routes WHERE name = ?1",
            params![name],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, Option<String>>(2)?, r.get::<_, i64>(3)? as u64)),
        )
        .optional()?;
    let Some((id, name, app, duration_ms)) = row else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT step_num, ts_offset_ms, kind, x, y, rel_x, rel_y, window_x, window_y, window_w, window_h,
                button, key_code, key_label, mod_cmd, mod_shift, mod_ctrl, mod_opt, ax_role, ax_label, pid, app_name
         FROM route_steps WHERE route_id = ?1 ORDER BY step_num",
    )?;
    let steps = stmt
        .query_map(params![id], |r| {
            let wx: Option<f64> = r.get(7)?;
            let wy: Option<f64> = r.get(8)?;
            let ww: Option<f64> = r.get(9)?;
            let wh: Option<f64> = r.get(10)?;
            let window = match (wx, wy, ww, wh) {
                (Some(x), Some(y), Some(w), Some(h)) => Some((x, y, w, h)),
                _ => None,
            };
            Ok(RecordedStep {
                step_num: r.get::<_, i64>(0)? as u32,
                ts_offset_ms: r.get::<_, i64>(1)? as u64,
                kind: RecordedStepKind::from_str(&r.get::<_, String>(2)?),
                x: r.get(3)?,
                y: r.get(4)?,
                rel_x: r.get(5)?,
                rel_y: r.get(6)?,
                window,
                button: r.get(11)?,
                key_code: r.get::<_, Option<i64>>(12)?.map(|v| v as u16),
                key_label: r.get(13)?,
                modifiers: Modifiers {
                    cmd: r.get::<_, i64>(14)? != 0,
                    shift: r.get::<_, i64>(15)? != 0,
                    ctrl: r.get::<_, i64>(16)? != 0,
                    opt: r.get::<_, i64>(17)? != 0,
                },
                ax_role: r.get(18)?,
                ax_label: r.get(19)?,
                pid: r.get(20)?,
                app_name: r.get(21)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Some(Route { id, name, app, duration_ms, steps }))
}

pub fn list(conn: &Connection) -> Result<Vec<Route>> {
    let mut stmt = conn.prepare("SELECT name FROM routes ORDER BY name")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);
    names.into_iter().filter_map(|name| get(conn, &name).transpose()).collect()
}

pub fn delete(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM routes WHERE name = ?1", params![name])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn click_step(n: u32, x: f64, y: f64) -> RecordedStep {
        RecordedStep {
            step_num: n,
            ts_offset_ms: n as u64 * 100,
            kind: RecordedStepKind::Click,
            x: Some(x),
            y: Some(y),
            rel_x: Some(0.5),
            rel_y: Some(0.5),
            window: Some((0.0, 0.0, 800.0, 600.0)),
            button: Some("left".into()),
            key_code: None,
            key_label: None,
            modifiers: Modifiers::default(),
            ax_role: Some("AXButton".into()),
            ax_label: Some("OK".into()),
            pid: Some(123),
            app_name: Some("Demo".into()),
        }
    }

    #[test]
    fn route_round_trips_with_steps() {
        let store = Store::open_in_memory().unwrap();
        store.route_create("dismiss-dialog", Some("Demo"), 1200, &[click_step(1, 400.0, 300.0)]).unwrap();
        let route = store.route_get("dismiss-dialog").unwrap().unwrap();
        assert_eq!(route.steps.len(), 1);
        assert_eq!(route.steps[0].ax_label.as_deref(), Some("OK"));
    }

    #[test]
    fn recreating_a_route_replaces_steps() {
        let store = Store::open_in_memory().unwrap();
        store.route_create("r", None, 100, &[click_step(1, 1.0, 1.0)]).unwrap();
        store.route_create("r", None, 200, &[click_step(1, 2.0, 2.0), click_step(2, 3.0, 3.0)]).unwrap();
        let route = store.route_get("r").unwrap().unwrap();
        assert_eq!(route.steps.len(), 2);
    }
}
