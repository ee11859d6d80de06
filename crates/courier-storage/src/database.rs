// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access runs through tokio-rusqlite's single background thread, which
//! serializes writes. Migrations run on a short-lived blocking connection
//! before the async handle opens.

use courier_core::CourierError;
use tracing::debug;

/// Handle to one SQLite database file.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if necessary) and migrate the database at `path`.
    pub async fn open(path: &str) -> Result<Self, CourierError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CourierError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| CourierError::Storage {
                    source: Box::new(e),
                })?;
            conn.execute_batch(
                "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| CourierError::Storage {
                source: Box::new(e),
            })?;
            crate::migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| CourierError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CourierError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; \
                 PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path, "database opened");
        Ok(Self { conn })
    }

    /// The shared async connection. All queries go through this handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}
