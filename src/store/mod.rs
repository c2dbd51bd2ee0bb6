//! String-keyed store of JSON blobs.
//!
//! Everything the app keeps lives under a handful of keys, each holding one
//! JSON document. Writes replace the whole value; the last writer wins.

pub mod employees;
pub mod memory;
pub mod mysql;
pub mod office;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Serialize, de::DeserializeOwned};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "store backend error: {}", _0)]
    Backend(String),

    #[display(fmt = "username '{}' is already taken", _0)]
    UsernameTaken(String),

    #[display(fmt = "malformed value under '{}': {}", key, source)]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Reads and decodes the JSON document under `key`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Malformed {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })?;
    store.set(key, raw).await
}
