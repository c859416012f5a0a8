use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::models::{StateLogEntry, StateRecord};
use super::schema;
use super::storage::{StateStorage, StorageError, StorageResult};

/// SQLite-backed state storage for local and single-node deployments.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the SQLite state database.
    pub fn open(db_path: &str) -> Result<Self> {
        let parent = Path::new(db_path).parent();
        if let Some(dir) = parent {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create tables and record the schema version.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(schema::CREATE_TABLES_SQL)?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![schema::SCHEMA_VERSION, Self::now(), "Initial schema"],
        )?;
        Ok(())
    }

    pub fn list_states(&self) -> StorageResult<Vec<StateRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, provisioner, revision, created_at, updated_at FROM provisioner_states ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StateRecord {
                    id: row.get(0)?,
                    provisioner: row.get(1)?,
                    revision: row.get::<_, i64>(2)? as u64,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn state_logs(&self, id: &str) -> StorageResult<Vec<StateLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT seq, state_id, message, created_at FROM provisioner_state_logs WHERE state_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(StateLogEntry {
                    seq: row.get(0)?,
                    state_id: row.get(1)?,
                    message: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("state database mutex poisoned".to_string()))
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[async_trait]
impl StateStorage for SqliteStorage {
    async fn save_state(
        &self,
        id: &str,
        data: &[u8],
        provisioner: &str,
        expected_revision: u64,
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let found: u64 = tx
            .query_row(
                "SELECT revision FROM provisioner_states WHERE id = ?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(|r| r as u64)
            .unwrap_or(0);

        if found != expected_revision {
            return Err(StorageError::Conflict {
                id: id.to_string(),
                expected: expected_revision,
                found,
            });
        }

        let now = Self::now();
        let next = (expected_revision + 1) as i64;
        if expected_revision == 0 {
            tx.execute(
                "INSERT INTO provisioner_states (id, provisioner, revision, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, provisioner, next, data, now],
            )?;
        } else {
            tx.execute(
                "UPDATE provisioner_states SET provisioner = ?2, revision = ?3, data = ?4, updated_at = ?5
                 WHERE id = ?1 AND revision = ?6",
                params![id, provisioner, next, data, now, expected_revision as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn get_state(&self, id: &str) -> StorageResult<Vec<u8>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT data FROM provisioner_states WHERE id = ?1",
            params![id],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn send_state_log(&self, id: &str, message: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO provisioner_state_logs (state_id, message, created_at) VALUES (?1, ?2, ?3)",
            params![id, message, Self::now()],
        )?;
        Ok(())
    }

    async fn delete_state(&self, id: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM provisioner_states WHERE id = ?1", params![id])?;
        Ok(())
    }
}
