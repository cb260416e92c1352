//! Implements the `Store` trait using in-memory data, for unit tests that should not touch the
//! disk.

use crate::api::Store;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// An implementation of the `Store` trait that holds every document in memory. The map key is
/// `(collection, document id)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    /// Create a new `MemoryStore` seeded with `data`.
    pub fn new(data: HashMap<(String, String), Value>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let data = self.data.lock().await;
        Ok(data
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, value: &Value) -> Result<()> {
        let mut data = self.data.lock().await;
        data.insert((collection.to_string(), id.to_string()), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_and_set() {
        let store = MemoryStore::default();
        assert!(store.get("expenses", "aggregated").await.unwrap().is_none());

        store
            .set("expenses", "aggregated", &json!({"entries": []}))
            .await
            .unwrap();
        store
            .set("expenses", "aggregated", &json!({"entries": [1]}))
            .await
            .unwrap();

        let doc = store.get("expenses", "aggregated").await.unwrap().unwrap();
        assert_eq!(doc, json!({"entries": [1]}));
        assert!(store.get("expenses", "backup").await.unwrap().is_none());
        assert!(store.get("other", "aggregated").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seeded() {
        let mut seed = HashMap::new();
        seed.insert(
            ("expenses".to_string(), "backup".to_string()),
            json!({"entries": [], "backupTime": "2024-08-01T00:00:00Z"}),
        );
        let store = MemoryStore::new(seed);
        assert!(store.get("expenses", "backup").await.unwrap().is_some());
    }
}
