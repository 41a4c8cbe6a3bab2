//! Annotation storage
//!
//! A plain key→value store keyed by normalized page URL. Values are kept as
//! raw JSON so that whatever is on disk (including records written by older
//! clients) is sanitized at the read boundary rather than rejected wholesale.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Key→value persistence consumed by the page session and the management surface
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Read one key
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write one key
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete one key (missing keys are not an error)
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Read every entry
    async fn get_all(&self) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Write several keys at once
    async fn set_many(&self, entries: BTreeMap<String, Value>) -> Result<(), StoreError>;

    /// Delete several keys at once
    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Write `entries`, then delete `stale`.
    ///
    /// Nothing is deleted unless every write succeeded.
    async fn replace_entries(
        &self,
        entries: BTreeMap<String, Value>,
        stale: &[String],
    ) -> Result<(), StoreError> {
        if !entries.is_empty() {
            self.set_many(entries).await?;
        }
        if !stale.is_empty() {
            self.remove_many(stale).await?;
        }
        Ok(())
    }
}

/// In-process store, used by tests and embedders without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing entries
    pub fn with_entries(entries: BTreeMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn set_many(&self, entries: BTreeMap<String, Value>) -> Result<(), StoreError> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn replace_entries(
        &self,
        incoming: BTreeMap<String, Value>,
        stale: &[String],
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.extend(incoming);
        for key in stale {
            entries.remove(key);
        }
        Ok(())
    }
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteAnnotationStore {
    pool: SqlitePool,
}

impl SqliteAnnotationStore {
    /// Create a new store over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the entries table
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotation_entries (
                url_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

const UPSERT_ENTRY: &str = r#"
    INSERT INTO annotation_entries (url_key, payload, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(url_key) DO UPDATE SET
        payload = excluded.payload,
        updated_at = excluded.updated_at
"#;

const DELETE_ENTRY: &str = "DELETE FROM annotation_entries WHERE url_key = ?";

#[async_trait]
impl AnnotationStore for SqliteAnnotationStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM annotation_entries WHERE url_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(payload,)| serde_json::from_str(&payload))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&value)?;

        sqlx::query(UPSERT_ENTRY)
            .bind(key)
            .bind(&payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query(DELETE_ENTRY)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT url_key, payload FROM annotation_entries ORDER BY url_key")
                .fetch_all(&self.pool)
                .await?;

        let mut entries = BTreeMap::new();
        for (key, payload) in rows {
            match serde_json::from_str(&payload) {
                Ok(value) => {
                    entries.insert(key, value);
                }
                Err(e) => tracing::warn!("Skipping unreadable entry {}: {}", key, e),
            }
        }
        Ok(entries)
    }

    async fn set_many(&self, entries: BTreeMap<String, Value>) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (key, value) in &entries {
            let payload = serde_json::to_string(value)?;
            sqlx::query(UPSERT_ENTRY)
                .bind(key)
                .bind(&payload)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for key in keys {
            sqlx::query(DELETE_ENTRY)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_entries(
        &self,
        entries: BTreeMap<String, Value>,
        stale: &[String],
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (key, value) in &entries {
            let payload = serde_json::to_string(value)?;
            sqlx::query(UPSERT_ENTRY)
                .bind(key)
                .bind(&payload)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }
        for key in stale {
            sqlx::query(DELETE_ENTRY)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
