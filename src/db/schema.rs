//! Persistence schema (spec §6): four tables, cascading delete from
//! `Inspection` to its children. Migrations are an external collaborator
//! (spec §1); this just establishes the schema on a fresh connection.

use rusqlite::Connection;

pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS inspections (
            inspection_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            ai_threshold_percent INTEGER NOT NULL,
            file_directory TEXT NOT NULL,
            any_defect_above_threshold INTEGER NOT NULL DEFAULT 0,
            verdict TEXT NOT NULL DEFAULT 'no_defect'
        );

        CREATE TABLE IF NOT EXISTS inspection_results (
            inspection_id INTEGER PRIMARY KEY REFERENCES inspections(inspection_id) ON DELETE CASCADE,
            discoloration INTEGER NOT NULL DEFAULT 0,
            hole INTEGER NOT NULL DEFAULT 0,
            knot INTEGER NOT NULL DEFAULT 0,
            dead_knot INTEGER NOT NULL DEFAULT 0,
            live_knot INTEGER NOT NULL DEFAULT 0,
            tight_knot INTEGER NOT NULL DEFAULT 0,
            length INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS inspection_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inspection_id INTEGER NOT NULL REFERENCES inspections(inspection_id) ON DELETE CASCADE,
            class_id INTEGER NOT NULL,
            class_label TEXT NOT NULL,
            x INTEGER NOT NULL,
            y INTEGER NOT NULL,
            w INTEGER NOT NULL,
            h INTEGER NOT NULL,
            length REAL NOT NULL,
            confidence REAL NOT NULL,
            image_path TEXT NOT NULL,
            image_no INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS presentations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inspection_id INTEGER NOT NULL REFERENCES inspections(inspection_id) ON DELETE CASCADE,
            group_name TEXT NOT NULL,
            image_path TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_details_inspection ON inspection_details(inspection_id);
        CREATE INDEX IF NOT EXISTS idx_presentations_inspection ON presentations(inspection_id);
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN \
                 ('inspections','inspection_results','inspection_details','presentations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn cascading_delete_removes_children() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO inspections (inspection_id, started_at, ai_threshold_percent, file_directory) \
             VALUES (1, '2026-01-01', 50, '/tmp')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO inspection_details (inspection_id, class_id, class_label, x, y, w, h, length, confidence, image_path, image_no) \
             VALUES (1, 1, 'hole', 0,0,1,1,0.01,0.9,'a.bmp',1)",
            [],
        )
        .unwrap();
        conn.execute("DELETE FROM inspections WHERE inspection_id = 1", [])
            .unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM inspection_details", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
