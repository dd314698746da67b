//! Idempotent schema creation (spec §6 database schema list).

use crate::error::Result;
use rusqlite::Connection;

pub fn create_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memory (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS labels (
            app TEXT NOT NULL,
            raw_label TEXT NOT NULL,
            learned_label TEXT NOT NULL,
            hits INTEGER NOT NULL DEFAULT 1,
            updated REAL NOT NULL,
            PRIMARY KEY (app, raw_label)
        );

        CREATE TABLE IF NOT EXISTS actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app TEXT NOT NULL,
            verb TEXT NOT NULL,
            ok INTEGER NOT NULL,
            ts REAL NOT NULL,
            intent TEXT,
            target TEXT,
            method TEXT,
            via_label TEXT
        );

        CREATE TABLE IF NOT EXISTS method_stats (
            app TEXT NOT NULL,
            method TEXT NOT NULL,
            ok_count INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (app, method)
        );

        CREATE TABLE IF NOT EXISTS workflows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            app TEXT,
            created REAL NOT NULL,
            updated REAL NOT NULL,
            success_count INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS workflow_steps (
            workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
            step_num INTEGER NOT NULL,
            action TEXT NOT NULL,
            expected_hash TEXT,
            timeout_ms INTEGER NOT NULL,
            PRIMARY KEY (workflow_id, step_num)
        );

        CREATE TABLE IF NOT EXISTS graph_nodes (
            hash TEXT PRIMARY KEY,
            app TEXT NOT NULL,
            label TEXT NOT NULL,
            first_seen REAL NOT NULL,
            last_seen REAL NOT NULL,
            visit_count INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS graph_edges (
            from_hash TEXT NOT NULL REFERENCES graph_nodes(hash) ON DELETE CASCADE,
            to_hash TEXT NOT NULL REFERENCES graph_nodes(hash) ON DELETE CASCADE,
            action TEXT NOT NULL,
            success_count INTEGER NOT NULL DEFAULT 0,
            fail_count INTEGER NOT NULL DEFAULT 0,
            avg_elapsed REAL NOT NULL DEFAULT 0,
            last_used REAL NOT NULL,
            PRIMARY KEY (from_hash, to_hash, action)
        );

        CREATE TABLE IF NOT EXISTS routes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            app TEXT,
            duration_ms INTEGER NOT NULL,
            step_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS route_steps (
            route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
            step_num INTEGER NOT NULL,
            ts_offset_ms INTEGER NOT NULL,
            kind TEXT NOT NULL,
            x REAL,
            y REAL,
            rel_x REAL,
            rel_y REAL,
            window_x REAL,
            window_y REAL,
            window_w REAL,
            window_h REAL,
            button TEXT,
            key_code INTEGER,
            key_label TEXT,
            mod_cmd INTEGER NOT NULL DEFAULT 0,
            mod_shift INTEGER NOT NULL DEFAULT 0,
            mod_ctrl INTEGER NOT NULL DEFAULT 0,
            mod_opt INTEGER NOT NULL DEFAULT 0,
            ax_role TEXT,
            ax_label TEXT,
            pid INTEGER,
            app_name TEXT,
            PRIMARY KEY (route_id, step_num)
        );
        "#,
    )?;
    Ok(())
}
