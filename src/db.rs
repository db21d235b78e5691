use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub user_id: String,
    pub lesson_id: String,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub completed: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub user_id: String,
    pub display_name: String,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS lesson_progress (
                user_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                position_secs REAL NOT NULL,
                duration_secs REAL NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, lesson_id)
            );
            CREATE INDEX IF NOT EXISTS idx_lesson_progress_updated
                ON lesson_progress(updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// At-most-one-insert reconciliation: creates the profile row on first
    /// sight, leaves an existing row untouched, and returns the stored row
    /// either way.
    pub fn ensure_profile(&self, user_id: &str, display_name: &str) -> Result<ProfileRow> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO profiles (user_id, display_name, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, display_name, now],
        )?;
        let row = self
            .conn
            .query_row(
                "SELECT user_id, display_name, created_at FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ProfileRow {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .with_context(|| format!("profile row missing after insert for {user_id}"))?;
        Ok(row)
    }

    pub fn upsert_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        position_secs: f64,
        duration_secs: f64,
        completed: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO lesson_progress (user_id, lesson_id, position_secs, duration_secs, completed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                position_secs = excluded.position_secs,
                duration_secs = excluded.duration_secs,
                completed = excluded.completed,
                updated_at = excluded.updated_at
            "#,
            params![user_id, lesson_id, position_secs, duration_secs, completed, now],
        )?;
        Ok(())
    }

    pub fn load_progress(&self, user_id: &str, lesson_id: &str) -> Result<Option<ProgressRow>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT user_id, lesson_id, position_secs, duration_secs, completed, updated_at
                FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2
                "#,
                params![user_id, lesson_id],
                Self::progress_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id, lesson_id, position_secs, duration_secs, completed, updated_at
            FROM lesson_progress WHERE user_id = ?1 ORDER BY updated_at DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], Self::progress_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Most recently updated, not-yet-completed lesson for the user; what the
    /// `resume` command picks up.
    pub fn last_in_progress(&self, user_id: &str) -> Result<Option<ProgressRow>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT user_id, lesson_id, position_secs, duration_secs, completed, updated_at
                FROM lesson_progress
                WHERE user_id = ?1 AND completed = 0
                ORDER BY updated_at DESC LIMIT 1
                "#,
                params![user_id],
                Self::progress_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn delete_progress(&self, user_id: &str, lesson_id: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
            params![user_id, lesson_id],
        )?;
        Ok(deleted > 0)
    }

    fn progress_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgressRow> {
        Ok(ProgressRow {
            user_id: row.get(0)?,
            lesson_id: row.get(1)?,
            position_secs: row.get(2)?,
            duration_secs: row.get(3)?,
            completed: row.get::<_, i64>(4)? != 0,
            updated_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("open in-memory db");
        db.migrate().expect("migrate");
        db
    }

    #[test]
    fn upsert_twice_leaves_a_single_row_with_latest_values() {
        let db = test_db();
        db.upsert_progress("user-1", "lesson-1", 120.0, 600.0, false)
            .expect("first save");
        db.upsert_progress("user-1", "lesson-1", 130.0, 600.0, false)
            .expect("second save");

        let rows = db.list_progress("user-1").expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position_secs, 130.0);
        assert!(!rows[0].completed);
    }

    #[test]
    fn progress_rows_are_isolated_per_user_and_lesson() {
        let db = test_db();
        db.upsert_progress("user-1", "lesson-1", 10.0, 600.0, false)
            .expect("save");
        db.upsert_progress("user-2", "lesson-1", 99.0, 600.0, false)
            .expect("save");
        db.upsert_progress("user-1", "lesson-2", 50.0, 300.0, true)
            .expect("save");

        let loaded = db
            .load_progress("user-1", "lesson-1")
            .expect("load")
            .expect("row exists");
        assert_eq!(loaded.position_secs, 10.0);
        assert_eq!(db.list_progress("user-1").expect("list").len(), 2);
        assert_eq!(db.list_progress("user-2").expect("list").len(), 1);
    }

    #[test]
    fn load_returns_none_for_unknown_lesson() {
        let db = test_db();
        assert!(db.load_progress("user-1", "missing").expect("load").is_none());
    }

    #[test]
    fn last_in_progress_skips_completed_lessons() {
        let db = test_db();
        db.upsert_progress("user-1", "done", 600.0, 600.0, true)
            .expect("save");
        db.upsert_progress("user-1", "half-way", 300.0, 600.0, false)
            .expect("save");

        let row = db
            .last_in_progress("user-1")
            .expect("query")
            .expect("row exists");
        assert_eq!(row.lesson_id, "half-way");
    }

    #[test]
    fn ensure_profile_inserts_once_and_keeps_the_original_row() {
        let db = test_db();
        let first = db.ensure_profile("user-1", "Amina").expect("first ensure");
        let second = db.ensure_profile("user-1", "Renamed").expect("second ensure");
        assert_eq!(first.display_name, "Amina");
        assert_eq!(second.display_name, "Amina");
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn delete_progress_reports_whether_a_row_was_removed() {
        let db = test_db();
        db.upsert_progress("user-1", "lesson-1", 10.0, 600.0, false)
            .expect("save");
        assert!(db.delete_progress("user-1", "lesson-1").expect("delete"));
        assert!(!db.delete_progress("user-1", "lesson-1").expect("second delete"));
    }
}
