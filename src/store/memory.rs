use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{KvStore, StoreError};

/// Process-local store, the default when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{get_json, set_json};

    #[actix_web::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        store.set("k", "1".into()).await.unwrap();
        store.set("k", "2".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[actix_web::test]
    async fn json_helpers_report_malformed_values() {
        let store = MemoryStore::new();
        set_json(&store, "nums", &vec![1, 2, 3]).await.unwrap();
        let nums: Option<Vec<u32>> = get_json(&store, "nums").await.unwrap();
        assert_eq!(nums, Some(vec![1, 2, 3]));

        store.set("nums", "{not json".into()).await.unwrap();
        let err = get_json::<Vec<u32>>(&store, "nums").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref key, .. } if key == "nums"));
    }
}
