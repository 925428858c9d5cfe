use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use tracing::debug;

use super::{BlobStore, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// S3-backed blob store
///
/// Keys map to `{base_prefix}{key}` object names in a single bucket.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    base_prefix: String,
    url_base: String,
}

impl S3BlobStore {
    /// Create a new S3 blob store around an existing client
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        base_prefix: impl Into<String>,
        url_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            base_prefix: base_prefix.into(),
            url_base: url_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a store using the default AWS credential chain
    pub async fn from_env(bucket: String, config: &StorageConfig) -> Self {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = Client::new(&aws_config);

        let url_base = match (&config.public_base_url, &config.region) {
            (Some(base), _) => base.clone(),
            (None, Some(region)) => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
            (None, None) => format!("https://{}.s3.amazonaws.com", bucket),
        };

        Self::new(client, bucket, config.base_prefix.clone(), url_base)
    }

    fn object_key(&self, key: &str) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(format!("{}{}", self.base_prefix, key))
    }
}

fn backend_error<E>(err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<()> {
        let object_key = self.object_key(key)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(backend_error)?;

        debug!("Uploaded {} bytes to s3://{}/{}", data.len(), self.bucket, object_key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let object_key = self.object_key(key)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    backend_error(e)
                }
            })?;

        let body = response.body.collect().await.map_err(backend_error)?;
        Ok(body.into_bytes().to_vec())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let object_key = self.object_key(key)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let object_prefix = format!("{}{}", self.base_prefix, prefix);
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&object_prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(backend_error)?;

            if let Some(contents) = response.contents {
                for obj in contents {
                    if let Some(key) = obj.key.as_deref().and_then(|k| k.strip_prefix(&self.base_prefix)) {
                        keys.push(key.to_string());
                    }
                }
            }

            if response.is_truncated.unwrap_or(false) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let object_key = self.object_key(key)?;

        // S3 reports success for missing keys
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}{}", self.url_base, self.base_prefix, key)
    }
}
