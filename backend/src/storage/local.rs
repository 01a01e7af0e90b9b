use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::mlclient::services::{FileStore, StoreError};

#[derive(Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        if path.split('/').any(|part| part == "..") {
            return Err(StoreError::Backend(format!("refusing path {}", path)));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn load(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(full.display().to_string()),
            _ => StoreError::Backend(format!("reading {}: {}", full.display(), e)),
        })
    }

    async fn save(&self, path: &str, content: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Backend(format!("creating {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| StoreError::Backend(format!("writing {}: {}", full.display(), e)))
    }
}
