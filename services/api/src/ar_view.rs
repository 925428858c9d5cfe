//! Per-project AR page generation
//!
//! The page is a fixed MindAR template with the project id, card image URL
//! and video URL substituted verbatim. It lives in the blob store at
//! `ar-projects/{projectId}/index.html`; its existence is its only state.

use common::{blob::BlobStore, error::StorageResult};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const TEMPLATE: &str = include_str!("templates/ar_view.html");

/// Key prefix under which every AR page is stored
pub const AR_ROOT: &str = "ar-projects";

pub fn artifact_dir(project_id: Uuid) -> String {
    format!("{}/{}/", AR_ROOT, project_id)
}

pub fn artifact_key(project_id: Uuid) -> String {
    format!("{}index.html", artifact_dir(project_id))
}

/// Fill the template; identical inputs give byte-identical output
pub fn render(project_id: Uuid, card_image_url: &str, video_url: &str) -> String {
    TEMPLATE
        .replace("{{PROJECT_ID}}", &project_id.to_string())
        .replace("{{CARD_IMAGE_URL}}", card_image_url)
        .replace("{{VIDEO_URL}}", video_url)
}

#[derive(Clone)]
pub struct ArViewGenerator {
    blobs: Arc<dyn BlobStore>,
}

impl ArViewGenerator {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub async fn exists(&self, project_id: Uuid) -> StorageResult<bool> {
        self.blobs.exists(&artifact_key(project_id)).await
    }

    /// Write (or overwrite) the page and return its key
    ///
    /// Inputs are trusted; callers make sure both assets exist.
    pub async fn generate(
        &self,
        project_id: Uuid,
        card_image_url: &str,
        video_url: &str,
    ) -> StorageResult<String> {
        let key = artifact_key(project_id);
        let html = render(project_id, card_image_url, video_url);
        self.blobs
            .put(&key, html.as_bytes(), "text/html; charset=utf-8")
            .await?;

        info!("Generated AR view for project {}", project_id);
        Ok(key)
    }

    /// Remove everything under the project's artifact directory
    pub async fn delete(&self, project_id: Uuid) -> StorageResult<()> {
        for key in self.blobs.list(&artifact_dir(project_id)).await? {
            self.blobs.delete(&key).await?;
        }
        Ok(())
    }

    pub fn public_url(&self, project_id: Uuid) -> String {
        self.blobs.public_url(&artifact_key(project_id))
    }
}
