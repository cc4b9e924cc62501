use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{missing_object, MetadataStore, ObjectStore};
use crate::error::PortfolioMcError;
use crate::PortfolioMcResult;

/// Write `body` to a uniquely named temp file beside `path` and rename it into
/// place, so readers never see a partial file and concurrent writers never
/// share a temp file.
fn write_atomic(path: &Path, body: &[u8]) -> PortfolioMcResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PortfolioMcError::io("write", format!("invalid path {}", path.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| PortfolioMcError::io(format!("create {}", parent.display()), e))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".pmc-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| PortfolioMcError::io(format!("create temp in {}", parent.display()), e))?;
    tmp.write_all(body)
        .map_err(|e| PortfolioMcError::io(format!("write {}", tmp.path().display()), e))?;
    tmp.persist(path)
        .map_err(|e| PortfolioMcError::io(format!("rename {}", path.display()), e.error))?;
    Ok(())
}

/// Reject keys that would escape the store root.
fn relative_key(kind: &str, key: &str) -> PortfolioMcResult<PathBuf> {
    let p = Path::new(key);
    let ok = !key.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(PortfolioMcError::InvalidInput {
            field: kind.into(),
            reason: format!("'{key}' is not a relative path"),
        });
    }
    Ok(p.to_path_buf())
}

/// Object store on the local filesystem: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalObjectStore { root: root.into() }
    }

    fn path(&self, bucket: &str, key: &str) -> PortfolioMcResult<PathBuf> {
        Ok(self
            .root
            .join(relative_key("bucket", bucket)?)
            .join(relative_key("key", key)?))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> PortfolioMcResult<Vec<u8>> {
        let path = self.path(bucket, key)?;
        if !path.is_file() {
            return Err(missing_object(bucket, key));
        }
        fs::read(&path).map_err(|e| PortfolioMcError::io(format!("read {}", path.display()), e))
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> PortfolioMcResult<String> {
        let path = self.path(bucket, key)?;
        write_atomic(&path, &body)?;
        debug!(path = %path.display(), bytes = body.len(), "Stored object");
        Ok(format!("file://{}", path.display()))
    }

    fn contains(&self, bucket: &str, key: &str) -> PortfolioMcResult<bool> {
        Ok(self.path(bucket, key)?.is_file())
    }
}

/// Metadata store keeping one JSON document per item:
/// `<root>/<table>/<key>.json`. An upsert rewrites only its own item, so
/// shards running as separate processes never clobber each other.
#[derive(Debug, Clone)]
pub struct LocalMetadataStore {
    root: PathBuf,
}

impl LocalMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalMetadataStore { root: root.into() }
    }

    fn item_path(&self, table: &str, key: &str) -> PortfolioMcResult<PathBuf> {
        let item = relative_key("key", key)?;
        if item.components().count() != 1 {
            return Err(PortfolioMcError::InvalidInput {
                field: "key".into(),
                reason: format!("'{key}' must not contain a path separator"),
            });
        }
        let mut file = item.into_os_string();
        file.push(".json");
        Ok(self.root.join(relative_key("table", table)?).join(file))
    }
}

impl MetadataStore for LocalMetadataStore {
    fn put_item(&self, table: &str, key: &str, item: Value) -> PortfolioMcResult<()> {
        let path = self.item_path(table, key)?;
        write_atomic(&path, serde_json::to_string_pretty(&item)?.as_bytes())?;
        debug!(path = %path.display(), "Stored item");
        Ok(())
    }

    fn get_item(&self, table: &str, key: &str) -> PortfolioMcResult<Option<Value>> {
        let path = self.item_path(table, key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| PortfolioMcError::io(format!("read {}", path.display()), e))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| PortfolioMcError::MalformedRecord(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let loc = store
            .put("bucket", "processed_data/x.csv", b"hello".to_vec())
            .unwrap();
        assert!(loc.starts_with("file://"));
        assert!(loc.ends_with("x.csv"));
        assert!(store.contains("bucket", "processed_data/x.csv").unwrap());
        assert_eq!(store.get("bucket", "processed_data/x.csv").unwrap(), b"hello");
        // No temp file left behind.
        let entries: Vec<_> = fs::read_dir(dir.path().join("bucket/processed_data"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(!store.contains("bucket", "nope.csv").unwrap());
        assert!(store.get("bucket", "nope.csv").is_err());
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("bucket", "../escape.csv", vec![]).is_err());
        assert!(store.put("/abs", "k", vec![]).is_err());
    }

    #[test]
    fn test_metadata_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        LocalMetadataStore::new(dir.path())
            .put_item("Sims", "a", json!({"Sharpe": "0.5"}))
            .unwrap();
        let store = LocalMetadataStore::new(dir.path());
        store.put_item("Sims", "b", json!({"Sharpe": "0.7"})).unwrap();
        assert_eq!(
            store.get_item("Sims", "a").unwrap(),
            Some(json!({"Sharpe": "0.5"}))
        );
        assert_eq!(
            store.get_item("Sims", "b").unwrap(),
            Some(json!({"Sharpe": "0.7"}))
        );
        assert_eq!(store.get_item("Other", "a").unwrap(), None);
    }

    #[test]
    fn test_key_with_separator_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMetadataStore::new(dir.path());
        assert!(store.put_item("Sims", "a/b", json!({})).is_err());
        assert!(store.put_item("Sims", "..", json!({})).is_err());
    }

    #[test]
    fn test_concurrent_upserts_from_separate_instances() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let handles: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|prefix| {
                let store = LocalMetadataStore::new(&root);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store
                            .put_item("Sims", &format!("{prefix}_{i}"), json!({ "N": i }))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = LocalMetadataStore::new(&root);
        for prefix in ["left", "right"] {
            for i in 0..100 {
                assert_eq!(
                    store.get_item("Sims", &format!("{prefix}_{i}")).unwrap(),
                    Some(json!({ "N": i })),
                    "{prefix}_{i} lost"
                );
            }
        }
        let leftovers = fs::read_dir(root.join("Sims"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
