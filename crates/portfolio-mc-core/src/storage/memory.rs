use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{missing_object, MetadataStore, ObjectStore};
use crate::error::PortfolioMcError;
use crate::PortfolioMcResult;

fn poisoned(operation: &str) -> PortfolioMcError {
    PortfolioMcError::io(operation, "store lock poisoned")
}

/// In-process object store, used by tests and single-machine runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> PortfolioMcResult<Vec<String>> {
        let objects = self.objects.read().map_err(|_| poisoned("list"))?;
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> PortfolioMcResult<Vec<u8>> {
        let objects = self.objects.read().map_err(|_| poisoned("get"))?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| missing_object(bucket, key))
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> PortfolioMcResult<String> {
        let mut objects = self.objects.write().map_err(|_| poisoned("put"))?;
        objects.insert((bucket.to_string(), key.to_string()), body);
        Ok(format!("mem://{bucket}/{key}"))
    }

    fn contains(&self, bucket: &str, key: &str) -> PortfolioMcResult<bool> {
        let objects = self.objects.read().map_err(|_| poisoned("contains"))?;
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }
}

/// In-process metadata store.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `table`.
    pub fn count(&self, table: &str) -> PortfolioMcResult<usize> {
        let tables = self.tables.read().map_err(|_| poisoned("count"))?;
        Ok(tables.get(table).map(|t| t.len()).unwrap_or(0))
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn put_item(&self, table: &str, key: &str, item: Value) -> PortfolioMcResult<()> {
        let mut tables = self.tables.write().map_err(|_| poisoned("put_item"))?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), item);
        Ok(())
    }

    fn get_item(&self, table: &str, key: &str) -> PortfolioMcResult<Option<Value>> {
        let tables = self.tables.read().map_err(|_| poisoned("get_item"))?;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_put_get() {
        let store = MemoryObjectStore::new();
        let loc = store.put("b", "k.csv", b"a,b\n".to_vec()).unwrap();
        assert_eq!(loc, "mem://b/k.csv");
        assert!(store.contains("b", "k.csv").unwrap());
        assert!(!store.contains("other", "k.csv").unwrap());
        assert_eq!(store.get("b", "k.csv").unwrap(), b"a,b\n".to_vec());
        assert_eq!(store.keys("b").unwrap(), vec!["k.csv".to_string()]);
    }

    #[test]
    fn test_missing_object_is_io_failure() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("b", "nope").unwrap_err(),
            PortfolioMcError::IoFailure { .. }
        ));
    }

    #[test]
    fn test_metadata_upsert_replaces() {
        let store = MemoryMetadataStore::new();
        store.put_item("t", "id", json!({"v": 1})).unwrap();
        store.put_item("t", "id", json!({"v": 2})).unwrap();
        assert_eq!(store.count("t").unwrap(), 1);
        assert_eq!(store.get_item("t", "id").unwrap(), Some(json!({"v": 2})));
        assert_eq!(store.get_item("t", "other").unwrap(), None);
    }
}
