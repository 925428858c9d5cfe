//! Asset records and list filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Closed set of asset kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "3d_model")]
    ThreeDModel,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "document")]
    Document,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Video => "video",
            AssetType::ThreeDModel => "3d_model",
            AssetType::Audio => "audio",
            AssetType::Document => "document",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(AssetType::Image),
            "video" => Ok(AssetType::Video),
            "3d_model" => Ok(AssetType::ThreeDModel),
            "audio" => Ok(AssetType::Audio),
            "document" => Ok(AssetType::Document),
            other => Err(format!("Unknown asset type: {}", other)),
        }
    }
}

/// Generic asset row, authoritative for existence and ownership
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub asset_type: AssetType,
    pub mime: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// Asset insertion payload
///
/// The id is chosen by the caller so the blob key can embed it before the
/// row exists.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub asset_type: AssetType,
    pub mime: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub storage_path: String,
}

/// Row in one of the typed mirror tables (`image_assets`, `video_assets`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirroredAsset {
    pub id: Uuid,
    /// Generic asset this row mirrors
    pub asset_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub mime: String,
    pub name: String,
    pub size: i64,
    pub url: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

pub type ImageAsset = MirroredAsset;
pub type VideoAsset = MirroredAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Filters shared by every asset listing
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub project_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for AssetFilter {
    fn default() -> Self {
        Self {
            asset_type: None,
            project_id: None,
            from: None,
            to: None,
            order: SortOrder::Desc,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl AssetFilter {
    /// Set limit and offset from a 1-based page number, clamping both
    pub fn paginate(mut self, page: Option<i64>, limit: Option<i64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        self.limit = limit;
        self.offset = (page - 1).saturating_mul(limit);
        self
    }

    /// Whether a record with these attributes passes the non-paging filters
    pub fn matches(
        &self,
        asset_type: Option<AssetType>,
        project_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> bool {
        if let (Some(wanted), Some(actual)) = (self.asset_type, asset_type) {
            if wanted != actual {
                return false;
            }
        }
        if self.project_id.is_some() && self.project_id != project_id {
            return false;
        }
        if self.from.is_some_and(|from| created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| created_at > to) {
            return false;
        }
        true
    }
}
