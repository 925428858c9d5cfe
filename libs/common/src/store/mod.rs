//! Relational metadata store
//!
//! Plain records in, plain records out. The PostgreSQL implementation enforces
//! referential integrity with foreign keys; other implementations (test doubles)
//! must reject the same dangling references.

pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{
    Asset, AssetFilter, CardSet, CardSetView, CardSlot, ImageAsset, NewAsset, NewProject, NewUser,
    Project, ProjectUpdate, User, UserUpdate, VideoAsset,
};

pub use postgres::PgMetadataStore;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    // Users

    /// Insert a user; a taken email yields `DatabaseError::UniqueViolation`
    async fn create_user(&self, new_user: &NewUser) -> DatabaseResult<User>;
    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;
    async fn list_users(&self) -> DatabaseResult<Vec<User>>;
    /// Apply a profile or password change; `None` if the user does not exist.
    /// A taken email yields `DatabaseError::UniqueViolation`.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> DatabaseResult<Option<User>>;
    /// Delete a user and everything they own
    async fn delete_user(&self, id: Uuid) -> DatabaseResult<bool>;

    // Projects

    async fn create_project(&self, new_project: &NewProject) -> DatabaseResult<Project>;
    async fn get_project(&self, id: Uuid) -> DatabaseResult<Option<Project>>;
    async fn list_projects_by_owner(&self, owner_user_id: Uuid) -> DatabaseResult<Vec<Project>>;
    /// Public, unarchived projects, most recently updated first, optionally
    /// restricted to one owner before paging
    async fn list_public_projects(
        &self,
        owner_user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Project>>;
    /// Apply the set fields; `None` if the project does not exist
    async fn update_project(
        &self,
        id: Uuid,
        update: &ProjectUpdate,
    ) -> DatabaseResult<Option<Project>>;
    /// Bump the view counter and last-access time
    async fn record_project_view(&self, id: Uuid) -> DatabaseResult<()>;
    async fn delete_project(&self, id: Uuid) -> DatabaseResult<bool>;

    // Assets

    async fn insert_asset(&self, new_asset: &NewAsset) -> DatabaseResult<Asset>;
    async fn insert_image_asset(&self, asset: &Asset) -> DatabaseResult<ImageAsset>;
    async fn insert_video_asset(&self, asset: &Asset) -> DatabaseResult<VideoAsset>;
    async fn get_asset(&self, id: Uuid) -> DatabaseResult<Option<Asset>>;
    async fn list_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>>;
    async fn list_assets_by_project(
        &self,
        project_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>>;
    async fn list_image_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<ImageAsset>>;
    async fn list_video_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<VideoAsset>>;
    async fn get_latest_image_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<ImageAsset>>;
    async fn get_latest_video_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<VideoAsset>>;
    /// Delete a generic asset row together with its mirrors
    async fn delete_asset(&self, id: Uuid) -> DatabaseResult<bool>;
    /// Delete the image and video mirror rows of a project
    async fn delete_typed_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64>;
    async fn delete_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64>;

    // Card sets

    /// Fetch the (user, project) card set, creating it with the next free
    /// `UserNNN` code if absent
    async fn get_or_create_card_set(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> DatabaseResult<CardSet>;
    /// Point one slot at an asset; the card set must already exist
    async fn set_card_set_slot(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        slot: CardSlot,
        asset_id: Uuid,
    ) -> DatabaseResult<CardSet>;
    async fn get_card_set(&self, user_id: Uuid, project_id: Uuid)
    -> DatabaseResult<Option<CardSet>>;
    /// Resolve a card set's slots to asset URLs by its public code
    async fn get_card_set_view(&self, code: &str) -> DatabaseResult<Option<CardSetView>>;
    async fn delete_card_sets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64>;
}
