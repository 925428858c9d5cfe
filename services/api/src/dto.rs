//! Request and response shapes of the HTTP API
//!
//! Everything on the wire is camelCase; internal records never leave the
//! service without going through one of these.

use chrono::{DateTime, Utc};
use common::models::{
    Asset, AssetFilter, AssetType, CardSetView, MirroredAsset, Project, SlotAsset, SortOrder,
    User, UserRole,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateProjectRequest {
    #[serde(default)]
    pub template_id: String,
    /// Owner to create the project for, honoured for admins only
    pub owner: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub is_public: bool,
    pub is_archived: bool,
    pub view_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_data: Option<serde_json::Value>,
}

impl ProjectResponse {
    /// Summary without the scene document
    pub fn summary(project: &Project) -> Self {
        Self {
            id: project.id,
            owner_user_id: project.owner_user_id,
            name: project.name.clone(),
            description: project.description.clone(),
            thumbnail: project.thumbnail.clone(),
            is_public: project.is_public,
            is_archived: project.is_archived,
            view_count: project.view_count,
            last_accessed: project.last_accessed,
            created_at: project.created_at,
            updated_at: project.updated_at,
            scene_data: None,
        }
    }

    pub fn full(project: &Project) -> Self {
        Self {
            scene_data: Some(project.scene_data.clone()),
            ..Self::summary(project)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub mime: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Asset> for AssetResponse {
    fn from(asset: &Asset) -> Self {
        Self {
            id: asset.id,
            user_id: asset.user_id,
            project_id: asset.project_id,
            asset_type: asset.asset_type,
            mime: asset.mime.clone(),
            name: asset.name.clone(),
            size: asset.size,
            url: asset.url.clone(),
            created_at: asset.created_at,
        }
    }
}

/// Row of the image or video listings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedAssetResponse {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub project_id: Option<Uuid>,
    pub mime: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&MirroredAsset> for TypedAssetResponse {
    fn from(asset: &MirroredAsset) -> Self {
        Self {
            id: asset.id,
            asset_id: asset.asset_id,
            project_id: asset.project_id,
            mime: asset.mime.clone(),
            name: asset.name.clone(),
            size: asset.size,
            url: asset.url.clone(),
            created_at: asset.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestAssetsResponse {
    pub image: Option<TypedAssetResponse>,
    pub video: Option<TypedAssetResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub asset_id: Uuid,
    pub typed_asset_id: Option<Uuid>,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub url: String,
    pub role: Option<String>,
    pub next_step_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssetResponse {
    pub asset_id: Uuid,
    pub url: String,
}

impl From<&SlotAsset> for SlotAssetResponse {
    fn from(slot: &SlotAsset) -> Self {
        Self {
            asset_id: slot.asset_id,
            url: slot.url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSetResponse {
    pub code: String,
    pub project_id: Uuid,
    pub logo: Option<SlotAssetResponse>,
    pub card: Option<SlotAssetResponse>,
    pub video: Option<SlotAssetResponse>,
}

impl From<&CardSetView> for CardSetResponse {
    fn from(view: &CardSetView) -> Self {
        Self {
            code: view.code.clone(),
            project_id: view.project_id,
            logo: view.logo.as_ref().map(SlotAssetResponse::from),
            card: view.card.as_ref().map(SlotAssetResponse::from),
            video: view.video.as_ref().map(SlotAssetResponse::from),
        }
    }
}

/// User row as shown in the admin panel
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Query string of the asset listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListQuery {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AssetListQuery {
    pub fn to_filter(&self) -> ApiResult<AssetFilter> {
        let asset_type = self
            .asset_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::parse::<AssetType>)
            .transpose()
            .map_err(ApiError::Validation)?;

        let order = match self.order.as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(ApiError::Validation(format!(
                    "Unknown sort order '{}', expected asc or desc",
                    other
                )));
            }
        };

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::Validation(
                    "'from' must not be after 'to'".to_string(),
                ));
            }
        }

        Ok(AssetFilter {
            asset_type,
            project_id: self.project_id,
            from: self.from,
            to: self.to,
            order,
            ..Default::default()
        }
        .paginate(self.page, self.limit))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIdQuery {
    pub project_id: Option<Uuid>,
}

/// Query string of the public AR project list
#[derive(Debug, Default, Deserialize)]
pub struct ArListQuery {
    pub owner: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub all: Option<String>,
}
