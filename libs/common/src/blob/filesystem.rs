use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Filesystem-backed blob store
///
/// Keys map to relative paths under `root`; parent directories are created on
/// demand and writes go through a temporary file so readers never see a
/// partially written object.
pub struct FilesystemBlobStore {
    root: PathBuf,
    url_base: String,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating the root if needed
    pub async fn new(root: PathBuf, url_base: impl Into<String>) -> StorageResult<Self> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            url_base: url_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting anything that could
    /// escape it
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains('\\') || key.contains('\0') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_file_name(format!(".tmp-{}", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Stored {} bytes at {}", data.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await? && fs::metadata(&path).await?.is_file())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Start from the deepest directory the prefix names
        let start = match prefix.rfind('/') {
            Some(idx) => self.resolve(&prefix[..idx])?,
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let is_temp = entry.file_name().to_string_lossy().starts_with(".tmp-");
                    if let Some(key) = self.key_for(&path) {
                        if !is_temp && key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.url_base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs"), "http://localhost:5000/uploads/")
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_creates_directories_on_demand() {
        let (store, _dir) = temp_store().await;
        store
            .put("u1/p1/assets/logo/a-logo.png", b"png", "image/png")
            .await
            .unwrap();

        assert!(store.root().join("u1/p1/assets/logo/a-logo.png").is_file());
        assert_eq!(
            store.get("u1/p1/assets/logo/a-logo.png").await.unwrap(),
            b"png"
        );
    }

    #[tokio::test]
    async fn put_overwrites_in_place() {
        let (store, _dir) = temp_store().await;
        store.put("k/index.html", b"one", "text/html").await.unwrap();
        store.put("k/index.html", b"two", "text/html").await.unwrap();
        assert_eq!(store.get("k/index.html").await.unwrap(), b"two");
        assert_eq!(store.list("k/").await.unwrap(), vec!["k/index.html"]);
    }

    #[tokio::test]
    async fn rejects_keys_escaping_the_root() {
        let (store, _dir) = temp_store().await;
        for key in ["../outside.txt", "/etc/passwd", "a/../../b", "", "a\\b", "./a"] {
            let result = store.put(key, b"x", "text/plain").await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _dir) = temp_store().await;
        assert!(matches!(
            store.get("nope/missing.bin").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!store.exists("nope/missing.bin").await.unwrap());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (store, _dir) = temp_store().await;
        store.put("a/b.txt", b"x", "text/plain").await.unwrap();
        store.delete("a/b.txt").await.unwrap();
        store.delete("a/b.txt").await.unwrap();
        assert!(!store.exists("a/b.txt").await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let (store, _dir) = temp_store().await;
        store.put("u1/p1/assets/logo/1-a.png", b"1", "image/png").await.unwrap();
        store.put("u1/p1/assets/card/2-b.jpg", b"2", "image/jpeg").await.unwrap();
        store.put("u1/p2/assets/logo/3-c.png", b"3", "image/png").await.unwrap();

        assert_eq!(
            store.list("u1/p1/").await.unwrap(),
            vec!["u1/p1/assets/card/2-b.jpg", "u1/p1/assets/logo/1-a.png"]
        );
        assert_eq!(store.list("u1/").await.unwrap().len(), 3);
        assert!(store.list("u9/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn public_url_joins_base_and_key() {
        let (store, _dir) = temp_store().await;
        assert_eq!(
            store.public_url("ar-projects/p1/index.html"),
            "http://localhost:5000/uploads/ar-projects/p1/index.html"
        );
    }
}
