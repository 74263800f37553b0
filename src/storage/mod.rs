//! Durable state store.
//!
//! One SQLite table of namespaced JSON blobs backs everything the engine
//! persists: the offline queue and the quota usage record. Each namespace
//! is read fully at startup and rewritten fully on each mutation; the
//! records are small and the simplicity buys crash safety.
//!
//! Persistence is strictly best-effort: a missing or corrupt record
//! degrades to the default value and a failed write is logged, never
//! surfaced to the reporting path.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::error_handling::PersistenceError;

/// Namespace holding the offline queue blob.
pub const OFFLINE_QUEUE_NAMESPACE: &str = "offline_queue";

/// Namespace holding the quota usage blob.
pub const QUOTA_USAGE_NAMESPACE: &str = "quota_usage";

/// Handle to the SQLite-backed blob store.
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    /// Opens (creating if necessary) a store at the given path.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::Open(e.to_string()))?;
            }
        }
        // SQLite requires the file to exist before connecting; avoid
        // truncating a store left by a previous session.
        std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(path)
            .map_err(|e| PersistenceError::Open(e.to_string()))?;

        let url = format!("sqlite:{}", path.to_string_lossy());
        let pool = SqlitePool::connect(&url).await?;
        run_migrations(&pool).await?;
        Ok(StateStore { pool })
    }

    /// Opens an in-memory store (nothing survives the process).
    pub async fn open_in_memory() -> Result<Self, PersistenceError> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        run_migrations(&pool).await?;
        Ok(StateStore { pool })
    }

    /// Loads and deserializes the blob under `namespace`.
    ///
    /// Returns `None` for a missing record; a corrupt record is logged
    /// and also reported as `None` so callers fall back to defaults.
    pub async fn load<T: DeserializeOwned>(&self, namespace: &str) -> Option<T> {
        let row = sqlx::query("SELECT payload FROM persisted_state WHERE namespace = ?")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await;

        let payload: String = match row {
            Ok(Some(row)) => row.get("payload"),
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read persisted state '{}': {}", namespace, e);
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(
                    "Corrupt persisted state '{}' ({}), falling back to defaults",
                    namespace,
                    e
                );
                None
            }
        }
    }

    /// Serializes `value` and rewrites the blob under `namespace`.
    pub async fn save<T: Serialize>(
        &self,
        namespace: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO persisted_state (namespace, payload, updated_at_ms)
             VALUES (?, ?, ?)
             ON CONFLICT(namespace) DO UPDATE SET
                 payload = excluded.payload,
                 updated_at_ms = excluded.updated_at_ms",
        )
        .bind(namespace)
        .bind(payload)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes the blob under `namespace`, if present.
    pub async fn clear(&self, namespace: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM persisted_state WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Closes the connection pool, leaving persisted state on disk.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), PersistenceError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS persisted_state (
            namespace TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}
