//! Key/value persistence for the subscription map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::database::DbPool;

/// Namespace used for subscription documents.
pub const SUBSCRIPTION_NAMESPACE: &str = "subscriptions";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// An async map of JSON documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read `key`, falling back to `default` when it is absent.
    async fn get_or(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }
}

/// [`KeyValueStore`] backed by the `kv_store` table.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: DbPool,
    namespace: String,
}

impl SqliteKvStore {
    pub fn new(pool: DbPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
                .bind(&self.namespace)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((raw,)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-process [`KeyValueStore`] for dry runs and tests.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `put`/`delete` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.lock().clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};
    use serde_json::json;

    async fn sqlite_store(namespace: &str) -> (DbPool, SqliteKvStore) {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool.clone(), SqliteKvStore::new(pool, namespace))
    }

    #[tokio::test]
    async fn test_sqlite_put_get_delete() {
        let (_pool, store) = sqlite_store(SUBSCRIPTION_NAMESPACE).await;

        assert_eq!(store.get("rooms").await.unwrap(), None);
        assert_eq!(store.get_or("rooms", json!([])).await.unwrap(), json!([]));

        store.put("rooms", json!(["42"])).await.unwrap();
        store.put("rooms", json!(["42", "7"])).await.unwrap();
        assert_eq!(store.get("rooms").await.unwrap(), Some(json!(["42", "7"])));

        store.delete("rooms").await.unwrap();
        assert_eq!(store.get("rooms").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_namespaces_are_isolated() {
        let (pool, first) = sqlite_store("first").await;
        let second = SqliteKvStore::new(pool, "second");

        first.put("key", json!(1)).await.unwrap();
        assert_eq!(second.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_write_failures() {
        let store = MemoryKvStore::new();
        store.put("key", json!("value")).await.unwrap();

        store.set_fail_writes(true);
        assert!(matches!(
            store.put("key", json!("other")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.delete("key").await.is_err());
        assert_eq!(store.get("key").await.unwrap(), Some(json!("value")));

        store.set_fail_writes(false);
        store.delete("key").await.unwrap();
        assert!(store.snapshot().is_empty());
    }
}
