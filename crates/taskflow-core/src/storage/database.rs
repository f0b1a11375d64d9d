//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed focus sessions (append-only)
//! - Tasks and their accumulated focus minutes
//! - Key-value store for application state

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data_dir;
use super::migrations;
use crate::error::{DatabaseError, RecorderError, Result};
use crate::recorder::{CompletedSessionRecord, SessionRecorder};
use crate::task::{self, Task, TaskId, TaskPriority, TaskStatus};
use crate::timer::SessionPhase;

/// A session row as read back from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: i64,
    #[serde(flatten)]
    pub record: CompletedSessionRecord,
}

/// Today's focus totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusSummary {
    pub work_sessions: u32,
    pub focus_min: u64,
    pub break_min: u64,
    /// Latest sessions, newest first.
    pub recent: Vec<StoredSession>,
}

/// SQLite database for session and task storage.
pub struct Database {
    conn: Connection,
}

const SUMMARY_RECENT: usize = 5;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Start of the local calendar day containing `now`, in UTC.
fn local_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_timezone(&Local)
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| now.date_naive().and_time(NaiveTime::MIN).and_utc())
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSession> {
    Ok(StoredSession {
        id: row.get(0)?,
        record: CompletedSessionRecord {
            task_id: row.get::<_, Option<String>>(1)?.map(TaskId::from),
            phase: parse_column(row, 2)?,
            duration_min: row.get(3)?,
            completed_at: parse_time(row, 4)?,
        },
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: TaskId::from(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_column::<TaskStatus>(row, 3)?,
        priority: parse_column::<TaskPriority>(row, 4)?,
        parent_id: row.get::<_, Option<String>>(5)?.map(TaskId::from),
        estimated_min: row.get(6)?,
        actual_min: row.get(7)?,
        created_at: parse_time(row, 8)?,
    })
}

const SESSION_COLUMNS: &str = "id, task_id, phase, duration_min, completed_at";
const TASK_COLUMNS: &str =
    "id, title, description, status, priority, parent_id, estimated_min, actual_min, created_at";

impl Database {
    /// Open the database at `<data_dir>/taskflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("taskflow.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Append a completed session to history.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, record: &CompletedSessionRecord) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (task_id, phase, duration_min, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.task_id.as_ref().map(TaskId::as_str),
                record.phase.as_str(),
                record.duration_min,
                timestamp(record.completed_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Sessions completed at or after `since`, newest first.
    pub fn sessions_since(&self, since: DateTime<Utc>) -> rusqlite::Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE completed_at >= ?1
             ORDER BY completed_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![timestamp(since)], session_from_row)?;
        rows.collect()
    }

    /// Sessions completed since local midnight, newest first.
    pub fn today_sessions(&self) -> rusqlite::Result<Vec<StoredSession>> {
        self.sessions_since(local_day_start(Utc::now()))
    }

    /// Work sessions completed since local midnight. Seeds the interval counter.
    pub fn work_sessions_today(&self) -> rusqlite::Result<u32> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE phase = ?1 AND completed_at >= ?2",
            params![
                SessionPhase::Work.as_str(),
                timestamp(local_day_start(Utc::now()))
            ],
            |row| row.get(0),
        )
    }

    /// The latest `limit` sessions regardless of day, newest first.
    pub fn recent_sessions(&self, limit: usize) -> rusqlite::Result<Vec<StoredSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], session_from_row)?;
        rows.collect()
    }

    pub fn today_summary(&self) -> rusqlite::Result<FocusSummary> {
        let sessions = self.today_sessions()?;
        let mut summary = FocusSummary::default();
        for session in &sessions {
            let minutes = u64::from(session.record.duration_min);
            if session.record.phase.is_break() {
                summary.break_min += minutes;
            } else {
                summary.work_sessions += 1;
                summary.focus_min += minutes;
            }
        }
        summary.recent = sessions.into_iter().take(SUMMARY_RECENT).collect();
        Ok(summary)
    }

    pub fn insert_task(&self, task: &Task) -> rusqlite::Result<()> {
        self.conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                task.id.as_str(),
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.parent_id.as_ref().map(TaskId::as_str),
                task.estimated_min,
                task.actual_min,
                timestamp(task.created_at),
            ],
        )?;
        debug!(task_id = %task.id, "task inserted");
        Ok(())
    }

    pub fn get_task(&self, id: &TaskId) -> rusqlite::Result<Option<Task>> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.as_str()],
                task_from_row,
            )
            .optional()
    }

    /// All tasks, newest first.
    pub fn list_tasks(&self) -> rusqlite::Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], task_from_row)?;
        rows.collect()
    }

    /// Tasks a work session may be bound to, most pressing first.
    pub fn selectable_tasks(&self) -> rusqlite::Result<Vec<Task>> {
        Ok(task::selectable_tasks(self.list_tasks()?))
    }

    /// Returns `false` if no task has this id.
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> rusqlite::Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SessionRecorder for Database {
    fn record_session(&self, record: &CompletedSessionRecord) -> std::result::Result<(), RecorderError> {
        Database::record_session(self, record)?;
        Ok(())
    }

    fn add_task_time(&self, task_id: &TaskId, minutes: u32) -> std::result::Result<(), RecorderError> {
        let changed = self.conn.execute(
            "UPDATE tasks SET actual_min = actual_min + ?1 WHERE id = ?2",
            params![minutes, task_id.as_str()],
        )?;
        if changed == 0 {
            return Err(RecorderError::TaskNotFound(task_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(phase: SessionPhase, minutes: u32, at: DateTime<Utc>) -> CompletedSessionRecord {
        CompletedSessionRecord {
            task_id: None,
            duration_min: minutes,
            phase,
            completed_at: at,
        }
    }

    #[test]
    fn record_and_query_today() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session(&record(SessionPhase::Work, 25, now)).unwrap();
        db.record_session(&record(SessionPhase::ShortBreak, 5, now)).unwrap();

        let summary = db.today_summary().unwrap();
        assert_eq!(summary.work_sessions, 1);
        assert_eq!(summary.focus_min, 25);
        assert_eq!(summary.break_min, 5);
        assert_eq!(summary.recent.len(), 2);
        assert_eq!(db.work_sessions_today().unwrap(), 1);
    }

    #[test]
    fn yesterday_is_not_today() {
        let db = Database::open_memory().unwrap();
        let old = local_day_start(Utc::now()) - Duration::minutes(1);
        db.record_session(&record(SessionPhase::Work, 25, old)).unwrap();

        assert_eq!(db.work_sessions_today().unwrap(), 0);
        assert!(db.today_sessions().unwrap().is_empty());
        assert_eq!(db.recent_sessions(10).unwrap().len(), 1);
    }

    #[test]
    fn recent_sessions_are_newest_first_and_limited() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        for offset in [30, 10, 20] {
            db.record_session(&record(SessionPhase::Work, 25, now - Duration::minutes(offset)))
                .unwrap();
        }
        let recent = db.recent_sessions(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].record.completed_at > recent[1].record.completed_at);
    }

    #[test]
    fn task_time_is_credited() {
        let db = Database::open_memory().unwrap();
        let task = Task::new("Write report");
        db.insert_task(&task).unwrap();

        SessionRecorder::add_task_time(&db, &task.id, 25).unwrap();
        SessionRecorder::add_task_time(&db, &task.id, 25).unwrap();
        assert_eq!(db.get_task(&task.id).unwrap().unwrap().actual_min, 50);
    }

    #[test]
    fn crediting_unknown_task_fails() {
        let db = Database::open_memory().unwrap();
        let err = SessionRecorder::add_task_time(&db, &"missing".into(), 25).unwrap_err();
        assert!(matches!(err, RecorderError::TaskNotFound(_)));
    }

    #[test]
    fn completed_tasks_drop_out_of_selection() {
        let db = Database::open_memory().unwrap();
        let task = Task::new("Inbox zero");
        db.insert_task(&task).unwrap();
        assert_eq!(db.selectable_tasks().unwrap().len(), 1);

        assert!(db.set_task_status(&task.id, TaskStatus::Done).unwrap());
        assert!(db.selectable_tasks().unwrap().is_empty());
        assert_eq!(db.list_tasks().unwrap().len(), 1);
        assert!(!db.set_task_status(&"missing".into(), TaskStatus::Done).unwrap());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        db.kv_set("test", "world").unwrap();
        assert_eq!(db.kv_get("test").unwrap().as_deref(), Some("world"));
        db.kv_delete("test").unwrap();
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn reopening_a_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskflow.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.record_session(&record(SessionPhase::Work, 25, Utc::now())).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.work_sessions_today().unwrap(), 1);
    }
}
