use boardbase_types::prelude::OwnerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local key-value store. Buckets are keyed by `table::owner`, so two
/// owners never share a bucket and a lookup cannot cross owner boundaries by
/// construction.
#[derive(Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_key(table: &str, owner: &OwnerId) -> String {
        format!("{}::{}", table, owner.0)
    }

    pub fn store(&self, table: &str, owner: &OwnerId, id: &str, value: serde_json::Value) {
        let key = Self::bucket_key(table, owner);
        let mut map = self.inner.records.write();
        map.entry(key).or_default().insert(id.to_string(), value);
    }

    pub fn fetch(&self, table: &str, owner: &OwnerId, id: &str) -> Option<serde_json::Value> {
        let key = Self::bucket_key(table, owner);
        self.inner
            .records
            .read()
            .get(&key)
            .and_then(|m| m.get(id).cloned())
    }

    pub fn remove(&self, table: &str, owner: &OwnerId, id: &str) -> Option<serde_json::Value> {
        let key = Self::bucket_key(table, owner);
        self.inner
            .records
            .write()
            .get_mut(&key)
            .and_then(|m| m.remove(id))
    }

    pub fn list(&self, table: &str, owner: &OwnerId) -> Vec<serde_json::Value> {
        let key = Self::bucket_key(table, owner);
        self.inner
            .records
            .read()
            .get(&key)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }
}
