//! Storage for the configuration document.
//!
//! The document is read fresh on every request so edits made through
//! `POST /api/config` (or by hand on disk) apply to the next completion.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use shared::config::ConfigDocument;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("failed to read configuration document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write configuration document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration document is not valid: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Owner of the raw configuration document.
#[async_trait]
pub trait ConfigStore: Send + Sync + Debug {
    /// Returns the document exactly as stored.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read or is not JSON.
    async fn load_document(&self) -> Result<Value, ConfigStoreError>;

    /// Replaces the stored document.
    ///
    /// # Errors
    /// Returns an error if the document cannot be persisted.
    async fn save_document(&self, document: Value) -> Result<(), ConfigStoreError>;

    /// Reads and parses one immutable snapshot.
    ///
    /// # Errors
    /// Returns an error if the document cannot be read or has the wrong shape.
    async fn snapshot(&self) -> Result<ConfigDocument, ConfigStoreError> {
        let raw = self.load_document().await?;
        Ok(ConfigDocument::from_value(raw)?)
    }
}

pub type SharedConfigStore = Arc<dyn ConfigStore>;

/// Document kept in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `default` when no document exists yet.
    ///
    /// # Errors
    /// Returns an error if the file cannot be inspected or written.
    pub async fn ensure_exists(&self, default: &ConfigDocument) -> Result<(), ConfigStoreError> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| ConfigStoreError::Read {
                path: self.path.clone(),
                source,
            })?;
        if exists {
            return Ok(());
        }

        info!(path = %self.path.display(), "seeding default configuration document");
        self.save_document(serde_json::to_value(default)?).await
    }

    // Unique per save so concurrent writers never share a temp file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load_document(&self) -> Result<Value, ConfigStoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ConfigStoreError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_document(&self, document: Value) -> Result<(), ConfigStoreError> {
        let contents = serde_json::to_vec_pretty(&document)?;
        let temp = self.temp_path();
        let write_error = |source| ConfigStoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        let written = match tokio::fs::write(&temp, contents).await {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(write_error(err));
        }

        debug!(path = %self.path.display(), "configuration document saved");
        Ok(())
    }
}

/// Document held in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<Value>,
}

impl MemoryStore {
    pub fn new(document: Value) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_document(&self) -> Result<Value, ConfigStoreError> {
        Ok(self.document.read().await.clone())
    }

    async fn save_document(&self, document: Value) -> Result<(), ConfigStoreError> {
        *self.document.write().await = document;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::config::Mode;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_store_seeds_default_document_once() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));

        store.ensure_exists(&ConfigDocument::default()).await.unwrap();
        let seeded = store.load_document().await.unwrap();
        assert_eq!(seeded["mode"], "mock");
        assert_eq!(seeded["mock_config"]["default_model"], "gpt-3.5-turbo");

        store.save_document(json!({"mode": "proxy"})).await.unwrap();
        store.ensure_exists(&ConfigDocument::default()).await.unwrap();
        assert_eq!(store.load_document().await.unwrap(), json!({"mode": "proxy"}));
    }

    #[tokio::test]
    async fn file_store_round_trips_verbatim_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = JsonFileStore::new(&path);
        let document = json!({
            "mode": "proxy",
            "proxy_config": {"enabled": true, "target_url": "http://127.0.0.1:9"},
            "custom": [1, 2, 3]
        });

        store.save_document(document.clone()).await.unwrap();

        assert_eq!(store.load_document().await.unwrap(), document);
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("config.json")]);
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.mode(), Mode::Proxy);
        assert!(snapshot.proxy_active());
    }

    #[tokio::test]
    async fn concurrent_saves_each_publish_a_whole_document() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("config.json")));
        let filler = "x".repeat(64 * 1024);

        let saves: Vec<_> = (0..8)
            .map(|writer| {
                let store = Arc::clone(&store);
                let document = json!({"writer": writer, "filler": filler});
                tokio::spawn(async move { store.save_document(document).await })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let stored = store.load_document().await.unwrap();
        assert!(stored["writer"].as_u64().unwrap() < 8);
        assert_eq!(stored["filler"].as_str().unwrap().len(), filler.len());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn file_store_reports_missing_and_malformed_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = JsonFileStore::new(&path);

        assert!(matches!(
            store.load_document().await,
            Err(ConfigStoreError::Read { .. })
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            store.load_document().await,
            Err(ConfigStoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_rejects_documents_with_the_wrong_shape() {
        let store = MemoryStore::new(json!({"preset_responses": "not a list"}));
        assert!(matches!(
            store.snapshot().await,
            Err(ConfigStoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_replaces_document() {
        let store = MemoryStore::new(json!({}));
        assert_eq!(store.snapshot().await.unwrap(), ConfigDocument::default());

        store.save_document(json!({"mode": "proxy"})).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().mode(), Mode::Proxy);
    }
}
