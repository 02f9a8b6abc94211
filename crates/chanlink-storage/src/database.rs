// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, which
//! also serializes writers. Do not open a second connection for writes.

use chanlink_core::ChanlinkError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into `ChanlinkError::Registry`.
pub(crate) fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> ChanlinkError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ChanlinkError::registry(e)
}

/// An open, migrated SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file at `path`, set PRAGMAs and migrate.
    pub async fn open(path: &str) -> Result<Self, ChanlinkError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ChanlinkError::registry)?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ChanlinkError::registry)?;
        debug!(path, "opened sqlite registry");
        Self::prepare(conn).await
    }

    /// Open a private in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, ChanlinkError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(ChanlinkError::registry)?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: tokio_rusqlite::Connection) -> Result<Self, ChanlinkError> {
        conn.call(|conn| -> rusqlite::Result<()> {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(run_migrations).await.map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), ChanlinkError> {
        self.conn
            .call(|conn| conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())))
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)
    }
}
