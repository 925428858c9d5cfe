//! Project lifecycle: creation, uploads, edits and cascading deletes
//!
//! Uploads write the blob first and the metadata rows second. When a row
//! cannot be written the blob (and any row already written) is removed again,
//! so a stored blob without its asset row only survives a failed cleanup, and
//! that case is logged with the key.

use common::{
    blob::{BlobStore, join_key},
    error::DatabaseError,
    models::{
        Asset, AssetFilter, AssetType, NewAsset, NewProject, Project, ProjectUpdate, User,
    },
    store::MetadataStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    access::{RequesterContext, can_read, can_write},
    ar_view::ArViewGenerator,
    error::{ApiError, ApiResult},
    templates::find_template,
    validation::{UploadRole, sanitize_filename, validate_upload},
};

pub const BUSINESS_CARD_PROJECT_NAME: &str = "AR Business Card Design";
pub const BUSINESS_CARD_PROJECT_DESCRIPTION: &str = "Interactive AR-enabled business card experience";

const MAX_PROJECT_NAME_LENGTH: usize = 50;

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    /// MIME type declared by the client
    pub mime: String,
    /// File name declared by the client, unsanitised
    pub filename: String,
    pub role: Option<UploadRole>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub asset: Asset,
    /// Id of the image/video mirror row, if one was written
    pub typed_asset_id: Option<Uuid>,
    pub project_id: Uuid,
    pub next_step: Option<UploadRole>,
    /// Set when the upload succeeded but the card set could not be updated
    pub warning: Option<String>,
}

/// Where a generated AR page ended up
#[derive(Debug, Clone, PartialEq)]
pub struct ArViewArtifact {
    pub key: String,
    pub url: String,
}

/// Blob key for an uploaded asset
///
/// `{owner}/{project}/assets/{role-or-type}/{assetId}-{filename}`
pub fn asset_key(
    owner_user_id: Uuid,
    project_id: Uuid,
    folder: &str,
    asset_id: Uuid,
    filename: &str,
) -> String {
    join_key(&[
        &owner_user_id.to_string(),
        &project_id.to_string(),
        "assets",
        folder,
        &format!("{}-{}", asset_id, filename),
    ])
}

/// Key prefix holding every asset blob of a project
pub fn project_prefix(owner_user_id: Uuid, project_id: Uuid) -> String {
    format!("{}/{}/", owner_user_id, project_id)
}

fn validate_project_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Please add a project name".to_string()));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LENGTH {
        return Err(ApiError::Validation(format!(
            "Project name cannot exceed {} characters",
            MAX_PROJECT_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct ProjectLifecycle {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    ar_view: ArViewGenerator,
}

impl ProjectLifecycle {
    pub fn new(store: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let ar_view = ArViewGenerator::new(blobs.clone());
        Self {
            store,
            blobs,
            ar_view,
        }
    }

    pub fn ar_view(&self) -> &ArViewGenerator {
        &self.ar_view
    }

    /// Load a project, mapping absence to `NotFound`
    pub async fn load_project(&self, project_id: Uuid) -> ApiResult<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))
    }

    /// Load a project the requester may read
    pub async fn readable_project(
        &self,
        project_id: Uuid,
        ctx: &RequesterContext,
    ) -> ApiResult<Project> {
        let project = self.load_project(project_id).await?;
        if !can_read(&project, ctx) {
            return Err(ApiError::Forbidden);
        }
        Ok(project)
    }

    /// Load a project the requester may modify
    pub async fn writable_project(
        &self,
        project_id: Uuid,
        ctx: &RequesterContext,
    ) -> ApiResult<Project> {
        let project = self.load_project(project_id).await?;
        if !can_write(&project, ctx) {
            return Err(ApiError::Forbidden);
        }
        Ok(project)
    }

    pub async fn create_project(
        &self,
        owner: &User,
        name: &str,
        description: Option<String>,
        thumbnail: Option<String>,
    ) -> ApiResult<Project> {
        let mut new_project = NewProject::new(owner.id, validate_project_name(name)?);
        new_project.description = description.filter(|d| !d.trim().is_empty());
        new_project.thumbnail = thumbnail.filter(|t| !t.trim().is_empty());

        let project = self.store.create_project(&new_project).await?;
        info!("User {} created project {}", owner.id, project.id);
        Ok(project)
    }

    /// Create the project a business-card wizard run fills in
    pub async fn start_business_card(&self, owner: &User) -> ApiResult<Project> {
        self.create_project(
            owner,
            BUSINESS_CARD_PROJECT_NAME,
            Some(BUSINESS_CARD_PROJECT_DESCRIPTION.to_string()),
            None,
        )
        .await
    }

    /// Create a project seeded from a catalogue template
    ///
    /// Admins may create it on behalf of another user by passing `owner`;
    /// for everyone else the override is ignored.
    pub async fn create_from_template(
        &self,
        requester: &User,
        template_id: &str,
        owner: Option<Uuid>,
    ) -> ApiResult<Project> {
        let template_id = template_id.trim();
        if template_id.is_empty() {
            return Err(ApiError::Validation("Template ID is required".to_string()));
        }
        let template = find_template(template_id).ok_or_else(|| ApiError::not_found("Template"))?;

        let owner = match owner {
            Some(owner_id) if requester.is_admin() && owner_id != requester.id => self
                .store
                .find_user_by_id(owner_id)
                .await?
                .ok_or_else(|| ApiError::not_found("User"))?,
            _ => requester.clone(),
        };

        let project = self
            .create_project(
                &owner,
                template.name,
                Some(template.description.to_string()),
                Some(template.thumbnail.to_string()),
            )
            .await?;
        info!("Project {} created from {}", project.id, template.id);
        Ok(project)
    }

    pub async fn upload_asset(
        &self,
        project_id: Uuid,
        uploader: &RequesterContext,
        upload: UploadRequest,
    ) -> ApiResult<UploadOutcome> {
        if uploader.user_id.is_none() {
            return Err(ApiError::Unauthorized);
        }
        let project = self.writable_project(project_id, uploader).await?;
        let asset_type = validate_upload(upload.role, &upload.mime, &upload.filename, upload.bytes.len())
            .map_err(ApiError::Validation)?;

        // Assets belong to the project owner even when an admin uploads them
        let owner_id = project.owner_user_id;
        let asset_id = Uuid::new_v4();
        let filename = sanitize_filename(&upload.filename);
        let folder = upload
            .role
            .map(|role| role.as_str())
            .unwrap_or(asset_type.as_str());
        let key = asset_key(owner_id, project.id, folder, asset_id, &filename);

        self.blobs.put(&key, &upload.bytes, &upload.mime).await?;

        let new_asset = NewAsset {
            id: asset_id,
            user_id: owner_id,
            project_id: Some(project.id),
            asset_type,
            mime: upload.mime.clone(),
            name: filename,
            size: upload.bytes.len() as i64,
            url: self.blobs.public_url(&key),
            storage_path: key.clone(),
        };

        let (asset, typed_asset_id) = match self.persist_asset(&new_asset).await {
            Ok(persisted) => persisted,
            Err((err, asset_written)) => {
                self.compensate_upload(&key, asset_written.then_some(asset_id))
                    .await;
                return Err(ApiError::Persistence(err));
            }
        };

        info!(
            "Stored {} asset {} for project {} at {}",
            asset.asset_type, asset.id, project.id, key
        );

        let mut warning = None;
        if let Some(role) = upload.role {
            if let Err(e) = self.fill_card_set_slot(&project, role, asset.id).await {
                warn!(
                    "Card set {} slot update failed for project {}: {}",
                    role, project.id, e
                );
                warning = Some(format!("Asset saved but the {} slot could not be updated", role));
            }

            if role == UploadRole::Logo && project.thumbnail.is_none() {
                let update = ProjectUpdate {
                    thumbnail: Some(asset.url.clone()),
                    ..Default::default()
                };
                if let Err(e) = self.store.update_project(project.id, &update).await {
                    warn!("Could not set thumbnail of project {}: {}", project.id, e);
                }
            }
        }

        Ok(UploadOutcome {
            project_id: project.id,
            next_step: upload.role.and_then(|role| role.next_step()),
            asset,
            typed_asset_id,
            warning,
        })
    }

    /// Insert the generic row and its mirror; on error also report whether
    /// the generic row was written
    async fn persist_asset(
        &self,
        new_asset: &NewAsset,
    ) -> Result<(Asset, Option<Uuid>), (DatabaseError, bool)> {
        let asset = self
            .store
            .insert_asset(new_asset)
            .await
            .map_err(|e| (e, false))?;

        let typed = match asset.asset_type {
            AssetType::Image => self.store.insert_image_asset(&asset).await.map(Some),
            AssetType::Video => self.store.insert_video_asset(&asset).await.map(Some),
            _ => Ok(None),
        };

        match typed {
            Ok(mirror) => Ok((asset, mirror.map(|m| m.id))),
            Err(e) => Err((e, true)),
        }
    }

    async fn compensate_upload(&self, key: &str, asset_id: Option<Uuid>) {
        if let Some(asset_id) = asset_id {
            if let Err(e) = self.store.delete_asset(asset_id).await {
                error!(
                    "Could not remove asset row {} after a failed upload: {}",
                    asset_id, e
                );
            }
        }

        if let Err(e) = self.blobs.delete(key).await {
            error!("Orphaned blob {} left after a failed upload: {}", key, e);
        }
    }

    async fn fill_card_set_slot(
        &self,
        project: &Project,
        role: UploadRole,
        asset_id: Uuid,
    ) -> Result<(), DatabaseError> {
        let owner_id = project.owner_user_id;
        let card_set = self.store.get_or_create_card_set(owner_id, project.id).await?;
        self.store
            .set_card_set_slot(owner_id, project.id, role.slot(), asset_id)
            .await?;
        info!(
            "Card set {} slot {} now points at {}",
            card_set.code, role, asset_id
        );
        Ok(())
    }

    /// Apply an edit; identifier, owner and timestamps are never editable
    pub async fn update_project(
        &self,
        project_id: Uuid,
        editor: &RequesterContext,
        mut update: ProjectUpdate,
    ) -> ApiResult<Project> {
        let project = self.writable_project(project_id, editor).await?;

        if let Some(name) = &update.name {
            update.name = Some(validate_project_name(name)?);
        }
        if update.is_empty() {
            return Ok(project);
        }

        self.store
            .update_project(project.id, &update)
            .await?
            .ok_or_else(|| ApiError::not_found("Project"))
    }

    pub async fn delete_project(
        &self,
        project_id: Uuid,
        requester: &RequesterContext,
    ) -> ApiResult<()> {
        let project = self.writable_project(project_id, requester).await?;
        self.remove_project(&project).await
    }

    /// Tear a project down; every step but the last logs and moves on
    async fn remove_project(&self, project: &Project) -> ApiResult<()> {
        let project_id = project.id;

        if let Err(e) = self.store.delete_typed_assets_by_project(project_id).await {
            warn!("Failed to delete typed assets of project {}: {}", project_id, e);
        }

        let everything = AssetFilter {
            limit: i64::MAX,
            ..Default::default()
        };
        match self.store.list_assets_by_project(project_id, &everything).await {
            Ok(assets) => {
                for asset in assets {
                    if let Err(e) = self.blobs.delete(&asset.storage_path).await {
                        warn!("Failed to delete blob {}: {}", asset.storage_path, e);
                    }
                }
            }
            Err(e) => warn!("Failed to list assets of project {}: {}", project_id, e),
        }

        if let Err(e) = self.store.delete_assets_by_project(project_id).await {
            warn!("Failed to delete assets of project {}: {}", project_id, e);
        }

        if let Err(e) = self.store.delete_card_sets_by_project(project_id).await {
            warn!("Failed to delete card set of project {}: {}", project_id, e);
        }

        if let Err(e) = self.ar_view.delete(project_id).await {
            warn!("Failed to delete AR view of project {}: {}", project_id, e);
        }

        self.store.delete_project(project_id).await?;
        info!("Deleted project {}", project_id);
        Ok(())
    }

    /// Admin removal of a user together with their projects and blobs
    pub async fn delete_user(&self, user_id: Uuid, requester: &RequesterContext) -> ApiResult<()> {
        if !requester.is_admin() {
            return Err(ApiError::Forbidden);
        }

        for project in self.store.list_projects_by_owner(user_id).await? {
            self.remove_project(&project).await?;
        }

        if !self.store.delete_user(user_id).await? {
            return Err(ApiError::not_found("User"));
        }
        info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Card image and video URLs for a project's AR page
    ///
    /// The card set slots win; the project's latest image and video fill in
    /// for empty slots.
    pub async fn ar_sources(&self, project: &Project) -> ApiResult<(String, String)> {
        let owner_id = project.owner_user_id;
        let card_set = self.store.get_card_set(owner_id, project.id).await?;

        let mut card_url = None;
        let mut video_url = None;
        if let Some(card_set) = &card_set {
            if let Some(id) = card_set.card_image_asset_id {
                card_url = self.store.get_asset(id).await?.map(|a| a.url);
            }
            if let Some(id) = card_set.video_asset_id {
                video_url = self.store.get_asset(id).await?.map(|a| a.url);
            }
        }

        if card_url.is_none() {
            card_url = self.latest_card_upload(project).await?.map(|a| a.url);
        }
        if video_url.is_none() {
            video_url = self
                .store
                .get_latest_video_by_user(owner_id, Some(project.id))
                .await?
                .map(|a| a.url);
        }

        match (card_url, video_url) {
            (Some(card), Some(video)) => Ok((card, video)),
            _ => Err(ApiError::Validation(
                "Upload a card image and a video before generating the AR view".to_string(),
            )),
        }
    }

    /// Most recent image uploaded through the card step of a project
    ///
    /// Logos and editor images are also image assets of the project and
    /// must never stand in for the tracked card.
    async fn latest_card_upload(&self, project: &Project) -> ApiResult<Option<Asset>> {
        let filter = AssetFilter {
            asset_type: Some(AssetType::Image),
            limit: i64::MAX,
            ..Default::default()
        };
        let card_folder = format!("/assets/{}/", UploadRole::Card.as_str());
        let images = self.store.list_assets_by_project(project.id, &filter).await?;
        Ok(images
            .into_iter()
            .find(|asset| asset.storage_path.contains(&card_folder)))
    }

    pub async fn generate_ar_view(
        &self,
        project_id: Uuid,
        requester: &RequesterContext,
    ) -> ApiResult<ArViewArtifact> {
        let project = self.writable_project(project_id, requester).await?;
        let (card_url, video_url) = self.ar_sources(&project).await?;
        let key = self.ar_view.generate(project.id, &card_url, &video_url).await?;

        Ok(ArViewArtifact {
            url: self.ar_view.public_url(project.id),
            key,
        })
    }

    /// Whether the AR page of a project has been generated
    pub async fn ar_view_exists(&self, project_id: Uuid) -> ApiResult<bool> {
        self.load_project(project_id).await?;
        Ok(self.ar_view.exists(project_id).await?)
    }

    /// Blob keys stored for a project, for its owner or an admin
    pub async fn list_project_blobs(
        &self,
        project_id: Uuid,
        requester: &RequesterContext,
    ) -> ApiResult<Vec<String>> {
        let project = self.writable_project(project_id, requester).await?;
        Ok(self
            .blobs
            .list(&project_prefix(project.owner_user_id, project.id))
            .await?)
    }
}
