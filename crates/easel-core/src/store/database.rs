use async_trait::async_trait;
use easel_canvas::persistence::CanvasStorageState;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use super::{CanvasStore, MediaBlob};
use crate::error::StorageError;

const STATE_KEY: &str = "canvas-state";

#[derive(Clone, Debug)]
/// SQLite persistence for the canvas.
///
/// ## Layout
/// - `canvas_state`: a single row keyed `canvas-state` holding the JSON document.
/// - `media`: one row per element id with the raw bytes, MIME type and duration.
///
/// Every write is a single upsert, so the last successful save wins and a
/// failed one leaves the previous row intact.
pub struct SqliteCanvasStore {
    pool: Pool<Sqlite>,
}

impl SqliteCanvasStore {
    pub async fn new(db_url: &str) -> Result<Self, StorageError> {
        // WAL keeps autosave writes from blocking concurrent reads.
        let connection_options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each connection to an in-memory database sees its own empty database.
        let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connection_options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS canvas_state (
                key TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                last_modified INTEGER NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                mime TEXT NOT NULL,
                duration REAL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::info!(db_url, "Canvas store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CanvasStore for SqliteCanvasStore {
    #[tracing::instrument(skip_all, fields(elements = state.elements.len()))]
    async fn save_state(&self, state: &CanvasStorageState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO canvas_state (key, state_json, last_modified)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                state_json = excluded.state_json,
                last_modified = excluded.last_modified,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(STATE_KEY)
        .bind(json)
        .bind(state.last_modified)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn load_state(&self) -> Result<Option<CanvasStorageState>, StorageError> {
        let row = sqlx::query("SELECT state_json FROM canvas_state WHERE key = ?")
            .bind(STATE_KEY)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("state_json");
        match serde_json::from_str(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::error!(error = %e, "Stored canvas state is malformed; starting empty");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, blob), fields(bytes = blob.bytes.len()))]
    async fn save_media(&self, id: &str, blob: &MediaBlob) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO media (id, data, mime, duration, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                mime = excluded.mime,
                duration = excluded.duration,
                created_at = excluded.created_at
            "#,
        )
        .bind(id)
        .bind(&blob.bytes)
        .bind(&blob.mime)
        .bind(blob.duration.map(f64::from))
        .bind(blob.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_media(&self, id: &str) -> Result<Option<MediaBlob>, StorageError> {
        let row = sqlx::query("SELECT data, mime, duration, created_at FROM media WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let duration: Option<f64> = row.get("duration");
            MediaBlob {
                bytes: row.get("data"),
                mime: row.get("mime"),
                duration: duration.map(|d| d as f32),
                created_at: row.get("created_at"),
            }
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn delete_media(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn media_ids(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT id FROM media ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}
