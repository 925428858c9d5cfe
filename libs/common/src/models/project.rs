//! Project model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Free-form scene document, stored as JSONB and never interpreted here
    pub scene_data: serde_json::Value,
    pub is_public: bool,
    pub is_archived: bool,
    pub view_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New project creation payload
#[derive(Debug, Clone)]
pub struct NewProject {
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub scene_data: serde_json::Value,
    pub is_public: bool,
    pub is_archived: bool,
}

impl NewProject {
    /// Private, unarchived project with an empty scene
    pub fn new(owner_user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            owner_user_id,
            name: name.into(),
            description: None,
            thumbnail: None,
            scene_data: serde_json::Value::Object(serde_json::Map::new()),
            is_public: false,
            is_archived: false,
        }
    }
}

/// Project update payload
///
/// Only editable columns exist here: identifier, owner and timestamp fields
/// sent by a client are dropped during deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub scene_data: Option<serde_json::Value>,
    pub is_public: Option<bool>,
    pub is_archived: Option<bool>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProjectUpdate::default()
    }

    /// Apply the set fields to an in-memory project
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(description) = &self.description {
            project.description = Some(description.clone());
        }
        if let Some(thumbnail) = &self.thumbnail {
            project.thumbnail = Some(thumbnail.clone());
        }
        if let Some(scene_data) = &self.scene_data {
            project.scene_data = scene_data.clone();
        }
        if let Some(is_public) = self.is_public {
            project.is_public = is_public;
        }
        if let Some(is_archived) = self.is_archived {
            project.is_archived = is_archived;
        }
    }
}
