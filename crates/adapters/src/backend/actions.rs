// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External-action backend: suspended actions in a shared SQLite store.
//!
//! State is the `status` column. A claim is one conditional UPDATE keyed by
//! primary id, so exclusivity comes from the store itself: the losing
//! claimant's UPDATE matches zero rows. Queries here are short and local,
//! so they run inline under the connection mutex.

use async_trait::async_trait;
use drover_core::{Task, TaskId};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BackendError, TaskBackend};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS actions (
    id          TEXT PRIMARY KEY,
    queue       TEXT NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL DEFAULT 'ready'
                CHECK (status IN ('ready', 'claimed', 'done', 'failed')),
    artifact    TEXT,
    error       TEXT,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actions_queue_status ON actions (queue, status);
CREATE TABLE IF NOT EXISTS action_notes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    action_id   TEXT NOT NULL,
    note        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
";

fn store_err(e: rusqlite::Error) -> BackendError {
    BackendError::Store(e.to_string())
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Clone)]
pub struct ActionBackend {
    conn: Arc<Mutex<Connection>>,
    queue: String,
}

impl ActionBackend {
    /// Open (and initialize) the store at `db`, scoped to one queue key
    pub fn open(db: &Path, queue: String) -> Result<Self, BackendError> {
        let conn = Connection::open(db).map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            queue,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn status_of(&self, id: &TaskId) -> Result<Option<String>, BackendError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT status FROM actions WHERE id = ?1 AND queue = ?2")
            .map_err(store_err)?;
        let mut rows = stmt.query(params![id.0, self.queue]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(store_err)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TaskBackend for ActionBackend {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id FROM actions WHERE queue = ?1 AND status = 'ready' ORDER BY rowid",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![self.queue], |row| row.get::<_, String>(0))
            .map_err(store_err)?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(TaskId(row.map_err(store_err)?));
        }
        Ok(ids)
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        let changed = {
            let conn = self.lock();
            conn.execute(
                "UPDATE actions SET status = 'claimed', updated_at = ?3
                 WHERE id = ?1 AND queue = ?2 AND status = 'ready'",
                params![id.0, self.queue, now_stamp()],
            )
            .map_err(store_err)?
        };
        if changed == 1 {
            return Ok(());
        }
        match self.status_of(id)? {
            None => Err(BackendError::NotFound(id.clone())),
            Some(_) => Err(BackendError::NotReady(id.clone())),
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT title, body, error FROM actions WHERE id = ?1 AND queue = ?2")
            .map_err(store_err)?;
        let mut rows = stmt.query(params![id.0, self.queue]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => Ok(Task {
                id: id.clone(),
                title: row.get(0).map_err(store_err)?,
                body: row.get(1).map_err(store_err)?,
                backend_ref: format!("actions:{}/{}", self.queue, id),
                error: row.get(2).map_err(store_err)?,
            }),
            None => Err(BackendError::NotFound(id.clone())),
        }
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        let changed = {
            let conn = self.lock();
            conn.execute(
                "UPDATE actions SET status = 'done', artifact = ?3, error = NULL, updated_at = ?4
                 WHERE id = ?1 AND queue = ?2 AND status IN ('claimed', 'done')",
                params![id.0, self.queue, artifact, now_stamp()],
            )
            .map_err(store_err)?
        };
        if changed == 1 {
            return Ok(());
        }
        match self.status_of(id)? {
            None => Err(BackendError::NotFound(id.clone())),
            Some(status) => Err(BackendError::WrongStage {
                id: id.clone(),
                expected: "claimed".to_string(),
                actual: status,
            }),
        }
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        // Failed actions requeue: back to ready with the error kept
        let changed = {
            let conn = self.lock();
            conn.execute(
                "UPDATE actions SET status = 'ready', error = ?3, updated_at = ?4
                 WHERE id = ?1 AND queue = ?2 AND status IN ('claimed', 'ready')",
                params![id.0, self.queue, error, now_stamp()],
            )
            .map_err(store_err)?
        };
        if changed == 1 {
            return Ok(());
        }
        match self.status_of(id)? {
            None => Err(BackendError::NotFound(id.clone())),
            Some(status) => Err(BackendError::Stale {
                id: id.clone(),
                stage: status,
            }),
        }
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO action_notes (action_id, note, created_at) VALUES (?1, ?2, ?3)",
            params![id.0, message, now_stamp()],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
