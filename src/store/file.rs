//! File-backed resource partition.
//!
//! One JSON file per resource, named by the MD5 hex digest of its URI,
//! under a per-partition directory. Writes go through a temp file and
//! `rename` so concurrent readers never observe a partial document.

use axum::async_trait;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};

use super::{Criteria, ResourceStore, is_match};
use crate::error::{AppError, Result};
use crate::resource::Resource;

pub struct FileResourceStore {
    partition_path: PathBuf,
}

impl FileResourceStore {
    pub fn new(store_path: impl AsRef<Path>, partition_name: &str) -> std::io::Result<Self> {
        let partition_path = store_path.as_ref().join(partition_name);
        std::fs::create_dir_all(&partition_path)?;
        tracing::info!(path = %partition_path.display(), "FileResourceStore initialized");
        Ok(Self { partition_path })
    }

    fn filepath(&self, uri: &str) -> PathBuf {
        let mut hasher = Md5::new();
        hasher.update(uri.as_bytes());
        let hash = hex_encode(&hasher.finalize());
        self.partition_path.join(format!("{hash}.json"))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn get(&self, uri: &str) -> Result<Option<Resource>> {
        let path = self.filepath(uri);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Store(format!("corrupt resource file {}: {e}", path.display()))
            })?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Store(e.to_string())),
        }
    }

    async fn is_stored(&self, uri: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.filepath(uri)).await.unwrap_or(false))
    }

    async fn put(&self, resource: Resource) -> Result<()> {
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Store("resource must have an 'id' property".into()))?;
        let path = self.filepath(id);
        let body = serde_json::to_vec_pretty(&resource)
            .map_err(|e| AppError::Store(format!("failed to serialize resource: {e}")))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.partition_path)
            .map_err(|e| AppError::Store(e.to_string()))?;
        tokio::fs::write(tmp.path(), &body)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        tmp.persist(&path)
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, uri: &str) -> Result<()> {
        match tokio::fs::remove_file(self.filepath(uri)).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    async fn query(&self, criteria: Criteria) -> Result<Vec<Resource>> {
        let mut matches = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.partition_path)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| AppError::Store(e.to_string()))?;
            let doc: Resource = serde_json::from_slice(&bytes)
                .map_err(|e| AppError::Store(format!("corrupt resource file {}: {e}", path.display())))?;
            if is_match(&doc, &criteria) {
                matches.push(doc);
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResourceStore::new(dir.path(), "test").unwrap();
        let id = "http://server.test/obj1";
        let original = json!({"id": id, "type": "Something"});
        store.put(original.clone()).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(original));
        store.remove(id).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn creates_partition_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let _ = FileResourceStore::new(dir.path(), "test").unwrap();
        assert!(dir.path().join("test").exists());
    }

    #[tokio::test]
    async fn query_scans_partition() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResourceStore::new(dir.path(), "test").unwrap();
        for i in 0..5 {
            store
                .put(json!({"id": format!("http://server.test/obj-{i}"), "name": format!("Thing-{i}")}))
                .await
                .unwrap();
        }
        let mut criteria = serde_json::Map::new();
        criteria.insert("name".into(), json!("Thing-3"));
        let results = store.query(criteria).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["id"], json!("http://server.test/obj-3"));

        let mut criteria = serde_json::Map::new();
        criteria.insert("name".into(), json!("Thing-999"));
        assert_eq!(store.query(criteria).await.unwrap(), Vec::<Resource>::new());
    }
}
