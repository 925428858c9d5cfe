//! Key-addressed blob storage
//!
//! Keys are `/`-separated relative paths such as
//! `{owner}/{project}/assets/logo/{asset}-logo.png`. The filesystem backend maps
//! them under a root directory, the S3 backend under a bucket and base prefix.

pub mod filesystem;
pub mod s3;

use async_trait::async_trait;
use std::{env, path::PathBuf, sync::Arc};
use tracing::info;

use crate::error::{StorageError, StorageResult};

pub use filesystem::FilesystemBlobStore;
pub use s3::S3BlobStore;

/// Uniform put/get/list/delete over a key string
///
/// Backend errors are returned unchanged; the store is not transactional and
/// callers own any compensation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing any existing object
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<()>;

    /// Read all bytes stored under `key`
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Check whether an object exists under `key`
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// List every key starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Delete `key`; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Public URL under which the object is served
    fn public_url(&self, key: &str) -> String;
}

const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5000";

/// Which backend holds the blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobStoreMode {
    Local,
    S3,
}

/// Blob store configuration, resolved once at start-up
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: BlobStoreMode,
    /// Root directory of the filesystem backend
    pub root: PathBuf,
    pub bucket: Option<String>,
    /// Prepended to every S3 object key
    pub base_prefix: String,
    /// Base of the public URLs handed to clients
    pub public_base_url: Option<String>,
    pub region: Option<String>,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BLOB_STORE_MODE`: `local` or `s3` (default: `local`)
    /// - `BLOB_ROOT`: filesystem root (default: `./uploads`)
    /// - `S3_BUCKET`: bucket name, required in `s3` mode
    /// - `S3_BASE_PREFIX`: object key prefix (default: empty)
    /// - `PUBLIC_BASE_URL`: URL base for served files (local default: `http://localhost:5000`,
    ///   S3 default: the bucket endpoint)
    /// - `AWS_REGION`: region used for default S3 URLs
    pub fn from_env() -> StorageResult<Self> {
        let mode = match env::var("BLOB_STORE_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" | "filesystem" => BlobStoreMode::Local,
            "s3" => BlobStoreMode::S3,
            other => {
                return Err(StorageError::Configuration(format!(
                    "Unknown BLOB_STORE_MODE '{}', expected 'local' or 's3'",
                    other
                )));
            }
        };

        let root = PathBuf::from(env::var("BLOB_ROOT").unwrap_or_else(|_| "./uploads".to_string()));
        let bucket = env::var("S3_BUCKET").ok().filter(|b| !b.is_empty());

        if mode == BlobStoreMode::S3 && bucket.is_none() {
            return Err(StorageError::Configuration(
                "S3_BUCKET must be set when BLOB_STORE_MODE=s3".to_string(),
            ));
        }

        let mut base_prefix = env::var("S3_BASE_PREFIX")
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        if !base_prefix.is_empty() {
            base_prefix.push('/');
        }

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            mode,
            root,
            bucket,
            base_prefix,
            public_base_url,
            region: env::var("AWS_REGION").ok(),
        })
    }
}

/// Build the configured backend
pub async fn build_blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config.mode {
        BlobStoreMode::Local => {
            info!("Using filesystem blob store at {}", config.root.display());
            let url_base = config
                .public_base_url
                .as_deref()
                .unwrap_or(DEFAULT_PUBLIC_BASE_URL);
            let store =
                FilesystemBlobStore::new(config.root.clone(), format!("{}/uploads", url_base))
                    .await?;
            Ok(Arc::new(store))
        }
        BlobStoreMode::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::Configuration("S3 bucket is not configured".to_string())
            })?;
            info!("Using S3 blob store in bucket {}", bucket);
            Ok(Arc::new(S3BlobStore::from_env(bucket, config).await))
        }
    }
}

/// Join key segments with `/`, skipping empty ones
pub fn join_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
