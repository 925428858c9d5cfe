//! Test doubles for the lifecycle and HTTP tests
//!
//! `InMemoryMetadataStore` mirrors the foreign keys and cascades of the
//! PostgreSQL schema. Both doubles can be told to fail specific operations.

#![allow(dead_code)]

use api::{AppState, config::AppConfig};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{
    blob::BlobStore,
    error::{DatabaseError, DatabaseResult, StorageError, StorageResult},
    jwt::{JwtConfig, JwtService},
    models::{
        Asset, AssetFilter, CardSet, CardSetView, CardSlot, ImageAsset, MirroredAsset, NewAsset,
        NewProject, NewUser, Project, ProjectUpdate, SlotAsset, SortOrder, User, UserRole,
        UserUpdate, VideoAsset, card_set_code,
    },
    store::MetadataStore,
};
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

fn injected() -> DatabaseError {
    DatabaseError::Query(sqlx::Error::PoolTimedOut)
}

fn missing(constraint: &str) -> DatabaseError {
    DatabaseError::MissingReference(constraint.to_string())
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    assets: Vec<Asset>,
    images: Vec<MirroredAsset>,
    videos: Vec<MirroredAsset>,
    card_sets: Vec<CardSet>,
    last_tick: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing timestamps so "latest" is well defined
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn remove_assets_where(&mut self, pred: impl Fn(&Asset) -> bool) -> u64 {
        let removed: Vec<Uuid> = self
            .assets
            .iter()
            .filter(|a| pred(a))
            .map(|a| a.id)
            .collect();
        self.assets.retain(|a| !removed.contains(&a.id));
        self.images.retain(|m| !removed.contains(&m.asset_id));
        self.videos.retain(|m| !removed.contains(&m.asset_id));
        for set in &mut self.card_sets {
            for slot in [CardSlot::Logo, CardSlot::CardImage, CardSlot::Video] {
                if set.slot(slot).is_some_and(|id| removed.contains(&id)) {
                    set.set_slot(slot, None);
                }
            }
        }
        removed.len() as u64
    }

    fn remove_project(&mut self, project_id: Uuid) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != project_id);
        if self.projects.len() == before {
            return false;
        }
        self.remove_assets_where(|a| a.project_id == Some(project_id));
        self.images.retain(|m| m.project_id != Some(project_id));
        self.videos.retain(|m| m.project_id != Some(project_id));
        self.card_sets.retain(|s| s.project_id != project_id);
        true
    }

    fn mirror(&mut self, asset: &Asset) -> DatabaseResult<MirroredAsset> {
        if !self.assets.iter().any(|a| a.id == asset.id) {
            return Err(missing("image_assets_asset_id_fkey"));
        }
        Ok(MirroredAsset {
            id: Uuid::new_v4(),
            asset_id: asset.id,
            user_id: asset.user_id,
            project_id: asset.project_id,
            mime: asset.mime.clone(),
            name: asset.name.clone(),
            size: asset.size,
            url: asset.url.clone(),
            storage_path: asset.storage_path.clone(),
            created_at: self.tick(),
        })
    }
}

fn page<T: Clone>(
    rows: impl Iterator<Item = T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
    filter: &AssetFilter,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|r| created_at(r));
    if filter.order == SortOrder::Desc {
        rows.reverse();
    }
    rows.into_iter()
        .skip(filter.offset.max(0) as usize)
        .take(filter.limit.max(0) as usize)
        .collect()
}

fn latest(rows: &[MirroredAsset], user_id: Uuid, project_id: Option<Uuid>) -> Option<MirroredAsset> {
    rows.iter()
        .filter(|m| m.user_id == user_id)
        .filter(|m| project_id.is_none() || m.project_id == project_id)
        .max_by_key(|m| m.created_at)
        .cloned()
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: Mutex<Tables>,
    pub fail_insert_asset: AtomicBool,
    pub fail_typed_insert: AtomicBool,
    pub fail_delete_asset: AtomicBool,
    pub fail_card_set: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn asset_count(&self) -> usize {
        self.tables().assets.len()
    }

    pub fn typed_count(&self) -> usize {
        let tables = self.tables();
        tables.images.len() + tables.videos.len()
    }

    pub fn card_set_count(&self) -> usize {
        self.tables().card_sets.len()
    }

    pub fn all_assets(&self) -> Vec<Asset> {
        self.tables().assets.clone()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_user(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::UniqueViolation("app_users_email_key".to_string()));
        }
        let now = tables.tick();
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            email: new_user.email.clone(),
            role: new_user.role,
            password_hash: new_user.password_hash.clone(),
            agreed_privacy: new_user.agreed_privacy,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> DatabaseResult<Vec<User>> {
        let mut users = self.tables().users.clone();
        users.sort_by_key(|u| std::cmp::Reverse(u.created_at));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> DatabaseResult<Option<User>> {
        let mut tables = self.tables();
        if let Some(email) = &update.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(DatabaseError::UniqueViolation("app_users_email_key".to_string()));
            }
        }
        let now = tables.tick();
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = &update.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(password_hash) = &update.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        let owned: Vec<Uuid> = tables
            .projects
            .iter()
            .filter(|p| p.owner_user_id == id)
            .map(|p| p.id)
            .collect();
        for project_id in owned {
            tables.remove_project(project_id);
        }
        tables.remove_assets_where(|a| a.user_id == id);
        tables.card_sets.retain(|s| s.user_id != id);
        Ok(true)
    }

    async fn create_project(&self, new_project: &NewProject) -> DatabaseResult<Project> {
        let mut tables = self.tables();
        if !tables.users.iter().any(|u| u.id == new_project.owner_user_id) {
            return Err(missing("projects_owner_user_id_fkey"));
        }
        let now = tables.tick();
        let project = Project {
            id: Uuid::new_v4(),
            owner_user_id: new_project.owner_user_id,
            name: new_project.name.clone(),
            description: new_project.description.clone(),
            thumbnail: new_project.thumbnail.clone(),
            scene_data: new_project.scene_data.clone(),
            is_public: new_project.is_public,
            is_archived: new_project.is_archived,
            view_count: 0,
            last_accessed: None,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> DatabaseResult<Option<Project>> {
        Ok(self.tables().projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_projects_by_owner(&self, owner_user_id: Uuid) -> DatabaseResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .tables()
            .projects
            .iter()
            .filter(|p| p.owner_user_id == owner_user_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| std::cmp::Reverse(p.updated_at));
        Ok(projects)
    }

    async fn list_public_projects(
        &self,
        owner_user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .tables()
            .projects
            .iter()
            .filter(|p| p.is_public && !p.is_archived)
            .filter(|p| owner_user_id.is_none_or(|owner| p.owner_user_id == owner))
            .cloned()
            .collect();
        projects.sort_by_key(|p| std::cmp::Reverse(p.updated_at));
        Ok(projects
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_project(
        &self,
        id: Uuid,
        update: &ProjectUpdate,
    ) -> DatabaseResult<Option<Project>> {
        let mut tables = self.tables();
        let now = tables.tick();
        let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        update.apply_to(project);
        project.updated_at = now;
        Ok(Some(project.clone()))
    }

    async fn record_project_view(&self, id: Uuid) -> DatabaseResult<()> {
        let mut tables = self.tables();
        let now = tables.tick();
        if let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) {
            project.view_count += 1;
            project.last_accessed = Some(now);
        }
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.tables().remove_project(id))
    }

    async fn insert_asset(&self, new_asset: &NewAsset) -> DatabaseResult<Asset> {
        if self.fail_insert_asset.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        if !tables.users.iter().any(|u| u.id == new_asset.user_id) {
            return Err(missing("assets_user_id_fkey"));
        }
        if let Some(project_id) = new_asset.project_id {
            if !tables.projects.iter().any(|p| p.id == project_id) {
                return Err(missing("assets_project_id_fkey"));
            }
        }
        let asset = Asset {
            id: new_asset.id,
            user_id: new_asset.user_id,
            project_id: new_asset.project_id,
            asset_type: new_asset.asset_type,
            mime: new_asset.mime.clone(),
            name: new_asset.name.clone(),
            size: new_asset.size,
            url: new_asset.url.clone(),
            storage_path: new_asset.storage_path.clone(),
            created_at: tables.tick(),
        };
        tables.assets.push(asset.clone());
        Ok(asset)
    }

    async fn insert_image_asset(&self, asset: &Asset) -> DatabaseResult<ImageAsset> {
        if self.fail_typed_insert.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        let mirror = tables.mirror(asset)?;
        tables.images.push(mirror.clone());
        Ok(mirror)
    }

    async fn insert_video_asset(&self, asset: &Asset) -> DatabaseResult<VideoAsset> {
        if self.fail_typed_insert.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        let mirror = tables.mirror(asset)?;
        tables.videos.push(mirror.clone());
        Ok(mirror)
    }

    async fn get_asset(&self, id: Uuid) -> DatabaseResult<Option<Asset>> {
        Ok(self.tables().assets.iter().find(|a| a.id == id).cloned())
    }

    async fn list_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>> {
        let tables = self.tables();
        let rows = tables.assets.iter().filter(|a| {
            a.user_id == user_id && filter.matches(Some(a.asset_type), a.project_id, a.created_at)
        });
        Ok(page(rows.cloned(), |a| a.created_at, filter))
    }

    async fn list_assets_by_project(
        &self,
        project_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>> {
        let tables = self.tables();
        let rows = tables.assets.iter().filter(|a| {
            a.project_id == Some(project_id)
                && filter.matches(Some(a.asset_type), a.project_id, a.created_at)
        });
        Ok(page(rows.cloned(), |a| a.created_at, filter))
    }

    async fn list_image_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<ImageAsset>> {
        let tables = self.tables();
        let rows = tables
            .images
            .iter()
            .filter(|m| m.user_id == user_id && filter.matches(None, m.project_id, m.created_at));
        Ok(page(rows.cloned(), |m| m.created_at, filter))
    }

    async fn list_video_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<VideoAsset>> {
        let tables = self.tables();
        let rows = tables
            .videos
            .iter()
            .filter(|m| m.user_id == user_id && filter.matches(None, m.project_id, m.created_at));
        Ok(page(rows.cloned(), |m| m.created_at, filter))
    }

    async fn get_latest_image_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<ImageAsset>> {
        Ok(latest(&self.tables().images, user_id, project_id))
    }

    async fn get_latest_video_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<VideoAsset>> {
        Ok(latest(&self.tables().videos, user_id, project_id))
    }

    async fn delete_asset(&self, id: Uuid) -> DatabaseResult<bool> {
        if self.fail_delete_asset.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.tables().remove_assets_where(|a| a.id == id) > 0)
    }

    async fn delete_typed_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        let mut tables = self.tables();
        let before = tables.images.len() + tables.videos.len();
        tables.images.retain(|m| m.project_id != Some(project_id));
        tables.videos.retain(|m| m.project_id != Some(project_id));
        Ok((before - tables.images.len() - tables.videos.len()) as u64)
    }

    async fn delete_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        Ok(self
            .tables()
            .remove_assets_where(|a| a.project_id == Some(project_id)))
    }

    async fn get_or_create_card_set(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> DatabaseResult<CardSet> {
        if self.fail_card_set.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        if let Some(existing) = tables
            .card_sets
            .iter()
            .find(|s| s.user_id == user_id && s.project_id == project_id)
        {
            return Ok(existing.clone());
        }
        if !tables.projects.iter().any(|p| p.id == project_id) {
            return Err(missing("user_card_sets_project_id_fkey"));
        }

        let mut sequence = tables.card_sets.iter().filter(|s| s.user_id == user_id).count() as i64 + 1;
        while tables
            .card_sets
            .iter()
            .any(|s| s.code == card_set_code(sequence))
        {
            sequence += 1;
        }

        let now = tables.tick();
        let card_set = CardSet {
            id: Uuid::new_v4(),
            user_id,
            project_id,
            code: card_set_code(sequence),
            logo_asset_id: None,
            card_image_asset_id: None,
            video_asset_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.card_sets.push(card_set.clone());
        Ok(card_set)
    }

    async fn set_card_set_slot(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        slot: CardSlot,
        asset_id: Uuid,
    ) -> DatabaseResult<CardSet> {
        if self.fail_card_set.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables();
        if !tables.assets.iter().any(|a| a.id == asset_id) {
            return Err(missing(slot.column()));
        }
        let now = tables.tick();
        let card_set = tables
            .card_sets
            .iter_mut()
            .find(|s| s.user_id == user_id && s.project_id == project_id)
            .ok_or(DatabaseError::Query(sqlx::Error::RowNotFound))?;
        card_set.set_slot(slot, Some(asset_id));
        card_set.updated_at = now;
        Ok(card_set.clone())
    }

    async fn get_card_set(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> DatabaseResult<Option<CardSet>> {
        Ok(self
            .tables()
            .card_sets
            .iter()
            .find(|s| s.user_id == user_id && s.project_id == project_id)
            .cloned())
    }

    async fn get_card_set_view(&self, code: &str) -> DatabaseResult<Option<CardSetView>> {
        let tables = self.tables();
        let Some(set) = tables.card_sets.iter().find(|s| s.code == code) else {
            return Ok(None);
        };
        let resolve = |id: Option<Uuid>| {
            id.and_then(|id| tables.assets.iter().find(|a| a.id == id))
                .map(|a| SlotAsset {
                    asset_id: a.id,
                    url: a.url.clone(),
                })
        };
        Ok(Some(CardSetView {
            code: set.code.clone(),
            project_id: set.project_id,
            logo: resolve(set.logo_asset_id),
            card: resolve(set.card_image_asset_id),
            video: resolve(set.video_asset_id),
        }))
    }

    async fn delete_card_sets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        let mut tables = self.tables();
        let before = tables.card_sets.len();
        tables.card_sets.retain(|s| s.project_id != project_id);
        Ok((before - tables.card_sets.len()) as u64)
    }
}

/// Blob store in a map, with switchable failures
#[derive(Default)]
pub struct FaultyBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FaultyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> StorageResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected put failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:5000/uploads/{}", key)
    }
}

pub const TEST_API_KEY: &str = "test-ar-key";

pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ar_api_key: Some(TEST_API_KEY.to_string()),
        client_url: "http://localhost:3000".to_string(),
        allowed_origins: None,
    }
}

pub fn jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: "test-secret".to_string(),
        expiry: 3600,
        remember_me_expiry: 7200,
    })
}

pub struct Harness {
    pub store: Arc<InMemoryMetadataStore>,
    pub blobs: Arc<FaultyBlobStore>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryMetadataStore::new());
        let blobs = Arc::new(FaultyBlobStore::new());
        let state = AppState::new(store.clone(), blobs.clone(), jwt_service(), test_config());
        Self {
            store,
            blobs,
            state,
        }
    }

    pub async fn user(&self, email: &str, role: UserRole) -> User {
        self.store
            .create_user(&NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: email.to_string(),
                role,
                password_hash: "not-a-real-hash".to_string(),
                agreed_privacy: true,
            })
            .await
            .unwrap()
    }

    pub fn token(&self, user: &User) -> String {
        self.state.jwt_service.generate_token(user, false).unwrap()
    }
}
