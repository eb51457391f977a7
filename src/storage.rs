use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::StoreError;

/// Opaque byte store keyed by name.
///
/// Persistent caches and the feed writer only ever see this interface; what
/// sits behind it (files, a browser-style storage area, memory) is not their
/// concern.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Loads the bytes stored under `name`, or `None` if nothing was saved yet.
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces whatever is stored under `name`.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Store based on one JSON file per key.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&data_dir).await?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        // Keys are caller-chosen identifiers; keep them from escaping the directory
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.data_dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.file_path(name);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!("📂 Cargado {} ({} bytes)", path.display(), bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.file_path(name);
        // Write to a sibling file first so a crash never leaves half a JSON document behind
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!("💾 Guardado {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).await.unwrap();

        assert!(store.load("nothing_here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).await.unwrap();

        store.save("feed", b"[1]").await.unwrap();
        store.save("feed", b"[1,2]").await.unwrap();

        assert_eq!(store.load("feed").await.unwrap().unwrap(), b"[1,2]".to_vec());
        assert!(dir.path().join("feed.json").exists());
    }

    #[tokio::test]
    async fn names_cannot_escape_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf()).await.unwrap();

        store.save("../evil", b"{}").await.unwrap();

        assert!(dir.path().join("___evil.json").exists());
    }
}
