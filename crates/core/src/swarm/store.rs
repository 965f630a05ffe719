//! # Snapshot Store
//!
//! Outbound persistence boundary. When a task reaches a terminal state its
//! final snapshot is handed to a [`SnapshotSink`]. The coordinator never
//! reads snapshots back.

use super::task::Task;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Receives final task snapshots
pub trait SnapshotSink: Send + Sync {
    fn persist(&self, task: &Task) -> Result<()>;
}

/// Discards snapshots
pub struct NoopSink;

impl SnapshotSink for NoopSink {
    fn persist(&self, _task: &Task) -> Result<()> {
        Ok(())
    }
}

/// SQLite-backed sink: one row per task holding the JSON snapshot
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    /// Open or create the store at `.scout/scout.db`
    pub fn open() -> Result<Self> {
        Self::open_at(".scout/scout.db")
    }

    /// Open the store at a specific path (useful for testing)
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path.as_ref()).context("Failed to open snapshot database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;
        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS task_snapshots (
                    task_id TEXT PRIMARY KEY,
                    subject TEXT NOT NULL,
                    status TEXT NOT NULL,
                    snapshot_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                [],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    /// Stored snapshot of a task
    pub fn load(&self, task_id: &str) -> Result<Option<Task>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM task_snapshots WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json).context("Corrupt task snapshot")?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM task_snapshots", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl SnapshotSink for SqliteSnapshotStore {
    fn persist(&self, task: &Task) -> Result<()> {
        let json = serde_json::to_string(task)?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        conn.execute(
            "INSERT OR REPLACE INTO task_snapshots (task_id, subject, status, snapshot_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task.id,
                task.subject,
                task.status.as_str(),
                json,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to persist task snapshot")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::pipeline::Pipeline;
    use crate::swarm::task::{TaskError, TaskStatus};
    use tempfile::tempdir;

    #[test]
    fn test_persist_and_load() {
        let dir = tempdir().unwrap();
        let store = SqliteSnapshotStore::open_at(dir.path().join("scout.db")).unwrap();
        let pipeline = Pipeline::new(Vec::new()).unwrap();

        let mut task = Task::new("t1", "Acme Corp", &pipeline);
        store.persist(&task).unwrap();
        task.finish(TaskStatus::Cancelled, Some(TaskError::cancelled()));
        store.persist(&task).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let loaded = store.load("t1").unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Cancelled);
        assert_eq!(loaded, task);
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("scout.db");
        {
            let store = SqliteSnapshotStore::open_at(&path).unwrap();
            let pipeline = Pipeline::new(Vec::new()).unwrap();
            store.persist(&Task::new("t1", "Acme", &pipeline)).unwrap();
        }
        let store = SqliteSnapshotStore::open_at(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
