//! Progress persistence seam between the session machine and SQLite.
//!
//! Progress tracking is a best-effort enhancement: a failed save or load must
//! never disturb playback. The SQLite implementation therefore reports
//! problems as stderr warnings and otherwise swallows them, and becomes a
//! no-op entirely when nobody is signed in.

use crate::db::Database;
use crate::settings::CurrentUser;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressRecord {
    pub(crate) position_secs: f64,
    pub(crate) duration_secs: f64,
    pub(crate) completed: bool,
}

pub(crate) trait ProgressStore {
    /// Idempotent upsert keyed on (current user, lesson). Must not fail the
    /// caller.
    fn save(&self, lesson_id: &str, position_secs: f64, duration_secs: f64, completed: bool);

    /// Unique record for (current user, lesson), or `None`, including when
    /// signed out or on any internal error.
    fn load(&self, lesson_id: &str) -> Option<ProgressRecord>;
}

pub(crate) struct SqliteProgressStore<'a> {
    db: &'a Database,
    user: Option<&'a CurrentUser>,
}

impl<'a> SqliteProgressStore<'a> {
    pub(crate) fn new(db: &'a Database, user: Option<&'a CurrentUser>) -> Self {
        Self { db, user }
    }
}

impl ProgressStore for SqliteProgressStore<'_> {
    fn save(&self, lesson_id: &str, position_secs: f64, duration_secs: f64, completed: bool) {
        let Some(user) = self.user else {
            return;
        };
        if let Err(err) = self.db.upsert_progress(
            &user.user_id,
            lesson_id,
            position_secs,
            duration_secs,
            completed,
        ) {
            eprintln!("Warning: progress save failed for {lesson_id}: {err}");
        }
    }

    fn load(&self, lesson_id: &str) -> Option<ProgressRecord> {
        let user = self.user?;
        match self.db.load_progress(&user.user_id, lesson_id) {
            Ok(row) => row.map(|row| ProgressRecord {
                position_secs: row.position_secs,
                duration_secs: row.duration_secs,
                completed: row.completed,
            }),
            Err(err) => {
                eprintln!("Warning: progress load failed for {lesson_id}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn signed_in_user() -> CurrentUser {
        CurrentUser {
            user_id: "user-1".to_string(),
            display_name: "User One".to_string(),
            provisional: false,
        }
    }

    fn test_db() -> Result<Database> {
        let db = Database::open_in_memory()?;
        db.migrate()?;
        Ok(db)
    }

    #[test]
    fn save_then_load_round_trips_through_sqlite() {
        let db = test_db().expect("db");
        let user = signed_in_user();
        let store = SqliteProgressStore::new(&db, Some(&user));

        store.save("lesson-1", 120.0, 600.0, false);
        let record = store.load("lesson-1").expect("record exists");
        assert_eq!(record.position_secs, 120.0);
        assert_eq!(record.duration_secs, 600.0);
        assert!(!record.completed);
    }

    #[test]
    fn repeated_saves_keep_a_single_row() {
        let db = test_db().expect("db");
        let user = signed_in_user();
        let store = SqliteProgressStore::new(&db, Some(&user));

        store.save("lesson-1", 120.0, 600.0, false);
        store.save("lesson-1", 120.0, 600.0, false);

        assert_eq!(db.list_progress("user-1").expect("list").len(), 1);
    }

    #[test]
    fn anonymous_store_never_writes_and_loads_nothing() {
        let db = test_db().expect("db");
        let store = SqliteProgressStore::new(&db, None);

        store.save("lesson-1", 120.0, 600.0, false);
        assert!(store.load("lesson-1").is_none());
        assert!(db.list_progress("user-1").expect("list").is_empty());
    }
}
