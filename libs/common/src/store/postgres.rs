//! PostgreSQL implementation of the metadata store

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use super::MetadataStore;
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{
    Asset, AssetFilter, CardSet, CardSetView, CardSlot, ImageAsset, MirroredAsset, NewAsset,
    NewProject, NewUser, Project, ProjectUpdate, SlotAsset, User, UserUpdate, VideoAsset,
    card_set_code,
};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, role, password_hash, agreed_privacy, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, owner_user_id, name, description, thumbnail, scene_data, \
     is_public, is_archived, view_count, last_accessed, created_at, updated_at";
const ASSET_COLUMNS: &str =
    "id, user_id, project_id, type, mime, name, size, url, storage_path, created_at";
const MIRROR_COLUMNS: &str =
    "id, asset_id, user_id, project_id, mime, name, size, url, storage_path, created_at";
const CARD_SET_COLUMNS: &str = "id, user_id, project_id, code, logo_asset_id, \
     card_image_asset_id, video_asset_id, created_at, updated_at";

/// Attempts at finding a free card set code before giving up
const MAX_CODE_ATTEMPTS: i64 = 1000;

/// Typed mirror tables
#[derive(Debug, Clone, Copy)]
enum Mirror {
    Image,
    Video,
}

impl Mirror {
    fn table(&self) -> &'static str {
        match self {
            Mirror::Image => "image_assets",
            Mirror::Video => "video_assets",
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        role: role.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        password_hash: row.try_get("password_hash")?,
        agreed_privacy: row.try_get("agreed_privacy")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: row.try_get("id")?,
        owner_user_id: row.try_get("owner_user_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        thumbnail: row.try_get("thumbnail")?,
        scene_data: row.try_get("scene_data")?,
        is_public: row.try_get("is_public")?,
        is_archived: row.try_get("is_archived")?,
        view_count: row.try_get("view_count")?,
        last_accessed: row.try_get("last_accessed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn asset_from_row(row: &PgRow) -> Result<Asset, sqlx::Error> {
    let asset_type: String = row.try_get("type")?;
    Ok(Asset {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        asset_type: asset_type
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        mime: row.try_get("mime")?,
        name: row.try_get("name")?,
        size: row.try_get("size")?,
        url: row.try_get("url")?,
        storage_path: row.try_get("storage_path")?,
        created_at: row.try_get("created_at")?,
    })
}

fn mirror_from_row(row: &PgRow) -> Result<MirroredAsset, sqlx::Error> {
    Ok(MirroredAsset {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        mime: row.try_get("mime")?,
        name: row.try_get("name")?,
        size: row.try_get("size")?,
        url: row.try_get("url")?,
        storage_path: row.try_get("storage_path")?,
        created_at: row.try_get("created_at")?,
    })
}

fn card_set_from_row(row: &PgRow) -> Result<CardSet, sqlx::Error> {
    Ok(CardSet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        code: row.try_get("code")?,
        logo_asset_id: row.try_get("logo_asset_id")?,
        card_image_asset_id: row.try_get("card_image_asset_id")?,
        video_asset_id: row.try_get("video_asset_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn slot_from_row(row: &PgRow, prefix: &str) -> Result<Option<SlotAsset>, sqlx::Error> {
    let asset_id: Option<Uuid> = row.try_get(format!("{}_id", prefix).as_str())?;
    let url: Option<String> = row.try_get(format!("{}_url", prefix).as_str())?;
    Ok(asset_id.zip(url).map(|(asset_id, url)| SlotAsset { asset_id, url }))
}

fn card_set_view_from_row(row: &PgRow) -> Result<CardSetView, sqlx::Error> {
    Ok(CardSetView {
        code: row.try_get("code")?,
        project_id: row.try_get("project_id")?,
        logo: slot_from_row(row, "logo")?,
        card: slot_from_row(row, "card")?,
        video: slot_from_row(row, "video")?,
    })
}

fn collect_rows<T>(
    rows: &[PgRow],
    map: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> DatabaseResult<Vec<T>> {
    rows.iter()
        .map(|row| map(row).map_err(DatabaseError::Query))
        .collect()
}

/// Append the non-paging filters, then ordering and paging
fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, filter: &AssetFilter, typed: bool) {
    if typed {
        if let Some(asset_type) = filter.asset_type {
            builder
                .push(" AND type = ")
                .push_bind(asset_type.as_str().to_string());
        }
    }
    if let Some(project_id) = filter.project_id {
        builder.push(" AND project_id = ").push_bind(project_id);
    }
    if let Some(from) = filter.from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
    builder
        .push(" ORDER BY created_at ")
        .push(filter.order.as_sql())
        .push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
}

/// Metadata store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    /// Create a new store over an initialized pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_mirror(&self, mirror: Mirror, asset: &Asset) -> DatabaseResult<MirroredAsset> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, asset_id, user_id, project_id, mime, name, size, url, storage_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            mirror.table(),
            MIRROR_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(asset.id)
        .bind(asset.user_id)
        .bind(asset.project_id)
        .bind(&asset.mime)
        .bind(&asset.name)
        .bind(asset.size)
        .bind(&asset.url)
        .bind(&asset.storage_path)
        .bind(asset.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        mirror_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn list_mirrors_by_user(
        &self,
        mirror: Mirror,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<MirroredAsset>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM {} WHERE user_id = ",
            MIRROR_COLUMNS,
            mirror.table()
        ));
        builder.push_bind(user_id);
        push_filters(&mut builder, filter, false);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        collect_rows(&rows, mirror_from_row)
    }

    async fn latest_mirror_by_user(
        &self,
        mirror: Mirror,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<MirroredAsset>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM {}
            WHERE user_id = $1 AND ($2::uuid IS NULL OR project_id = $2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            MIRROR_COLUMNS,
            mirror.table()
        ))
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(mirror_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_user(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO app_users (id, first_name, last_name, email, role, password_hash, agreed_privacy)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.email)
        .bind(new_user.role.as_str())
        .bind(&new_user.password_hash)
        .bind(new_user.agreed_privacy)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        user_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM app_users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_user_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM app_users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> DatabaseResult<Option<User>> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new("UPDATE app_users SET updated_at = NOW()");

        if let Some(first_name) = &update.first_name {
            builder.push(", first_name = ").push_bind(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            builder.push(", last_name = ").push_bind(last_name.clone());
        }
        if let Some(email) = &update.email {
            builder.push(", email = ").push_bind(email.clone());
        }
        if let Some(role) = update.role {
            builder.push(", role = ").push_bind(role.as_str());
        }
        if let Some(password_hash) = &update.password_hash {
            builder.push(", password_hash = ").push_bind(password_hash.clone());
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", USER_COLUMNS));

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn list_users(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM app_users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        collect_rows(&rows, user_from_row)
    }

    async fn delete_user(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM app_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_project(&self, new_project: &NewProject) -> DatabaseResult<Project> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO projects (id, owner_user_id, name, description, thumbnail, scene_data, is_public, is_archived)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new_project.owner_user_id)
        .bind(&new_project.name)
        .bind(&new_project.description)
        .bind(&new_project.thumbnail)
        .bind(&new_project.scene_data)
        .bind(new_project.is_public)
        .bind(new_project.is_archived)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        project_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn get_project(&self, id: Uuid) -> DatabaseResult<Option<Project>> {
        let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(project_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn list_projects_by_owner(&self, owner_user_id: Uuid) -> DatabaseResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM projects WHERE owner_user_id = $1 ORDER BY updated_at DESC",
            PROJECT_COLUMNS
        ))
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        collect_rows(&rows, project_from_row)
    }

    async fn list_public_projects(
        &self,
        owner_user_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM projects
            WHERE is_public = TRUE AND is_archived = FALSE
              AND ($1::uuid IS NULL OR owner_user_id = $1)
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            "#,
            PROJECT_COLUMNS
        ))
        .bind(owner_user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        collect_rows(&rows, project_from_row)
    }

    async fn update_project(
        &self,
        id: Uuid,
        update: &ProjectUpdate,
    ) -> DatabaseResult<Option<Project>> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new("UPDATE projects SET updated_at = NOW()");

        if let Some(name) = &update.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &update.description {
            builder.push(", description = ").push_bind(description.clone());
        }
        if let Some(thumbnail) = &update.thumbnail {
            builder.push(", thumbnail = ").push_bind(thumbnail.clone());
        }
        if let Some(scene_data) = &update.scene_data {
            builder.push(", scene_data = ").push_bind(scene_data.clone());
        }
        if let Some(is_public) = update.is_public {
            builder.push(", is_public = ").push_bind(is_public);
        }
        if let Some(is_archived) = update.is_archived {
            builder.push(", is_archived = ").push_bind(is_archived);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {}", PROJECT_COLUMNS));

        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(project_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn record_project_view(&self, id: Uuid) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE projects
            SET view_count = view_count + 1, last_accessed = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_asset(&self, new_asset: &NewAsset) -> DatabaseResult<Asset> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO assets (id, user_id, project_id, type, mime, name, size, url, storage_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ASSET_COLUMNS
        ))
        .bind(new_asset.id)
        .bind(new_asset.user_id)
        .bind(new_asset.project_id)
        .bind(new_asset.asset_type.as_str())
        .bind(&new_asset.mime)
        .bind(&new_asset.name)
        .bind(new_asset.size)
        .bind(&new_asset.url)
        .bind(&new_asset.storage_path)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        asset_from_row(&row).map_err(DatabaseError::Query)
    }

    async fn insert_image_asset(&self, asset: &Asset) -> DatabaseResult<ImageAsset> {
        self.insert_mirror(Mirror::Image, asset).await
    }

    async fn insert_video_asset(&self, asset: &Asset) -> DatabaseResult<VideoAsset> {
        self.insert_mirror(Mirror::Video, asset).await
    }

    async fn get_asset(&self, id: Uuid) -> DatabaseResult<Option<Asset>> {
        let row = sqlx::query(&format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(asset_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn list_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM assets WHERE user_id = ",
            ASSET_COLUMNS
        ));
        builder.push_bind(user_id);
        push_filters(&mut builder, filter, true);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        collect_rows(&rows, asset_from_row)
    }

    async fn list_assets_by_project(
        &self,
        project_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<Asset>> {
        let filter = AssetFilter {
            project_id: Some(project_id),
            ..filter.clone()
        };
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM assets WHERE TRUE", ASSET_COLUMNS));
        push_filters(&mut builder, &filter, true);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        collect_rows(&rows, asset_from_row)
    }

    async fn list_image_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<ImageAsset>> {
        self.list_mirrors_by_user(Mirror::Image, user_id, filter).await
    }

    async fn list_video_assets_by_user(
        &self,
        user_id: Uuid,
        filter: &AssetFilter,
    ) -> DatabaseResult<Vec<VideoAsset>> {
        self.list_mirrors_by_user(Mirror::Video, user_id, filter).await
    }

    async fn get_latest_image_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<ImageAsset>> {
        self.latest_mirror_by_user(Mirror::Image, user_id, project_id)
            .await
    }

    async fn get_latest_video_by_user(
        &self,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> DatabaseResult<Option<VideoAsset>> {
        self.latest_mirror_by_user(Mirror::Video, user_id, project_id)
            .await
    }

    async fn delete_asset(&self, id: Uuid) -> DatabaseResult<bool> {
        // Mirrors cascade, card set slots are nulled by their foreign keys
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_typed_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_query)?;
        let mut deleted = 0;

        for mirror in [Mirror::Image, Mirror::Video] {
            let result = sqlx::query(&format!(
                "DELETE FROM {} WHERE project_id = $1",
                mirror.table()
            ))
            .bind(project_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_query)?;
            deleted += result.rows_affected();
        }

        tx.commit().await.map_err(DatabaseError::from_query)?;
        Ok(deleted)
    }

    async fn delete_assets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM assets WHERE project_id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected())
    }

    async fn get_or_create_card_set(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> DatabaseResult<CardSet> {
        if let Some(existing) = self.get_card_set(user_id, project_id).await? {
            return Ok(existing);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_card_sets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        // Codes are unique across all users, so the per-user sequence may
        // have to skip numbers already taken by someone else
        for sequence in (count + 1)..(count + 1 + MAX_CODE_ATTEMPTS) {
            let code = card_set_code(sequence);
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO user_card_sets (id, user_id, project_id, code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                RETURNING {}
                "#,
                CARD_SET_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(project_id)
            .bind(&code)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

            if let Some(row) = row {
                info!("Created card set {} for project {}", code, project_id);
                return card_set_from_row(&row).map_err(DatabaseError::Query);
            }

            // Either a concurrent request created this pair or the code is taken
            if let Some(existing) = self.get_card_set(user_id, project_id).await? {
                return Ok(existing);
            }
        }

        warn!("No free card set code found for user {}", user_id);
        Err(DatabaseError::UniqueViolation("user_card_sets_code_key".to_string()))
    }

    async fn set_card_set_slot(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        slot: CardSlot,
        asset_id: Uuid,
    ) -> DatabaseResult<CardSet> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE user_card_sets
            SET {} = $3, updated_at = NOW()
            WHERE user_id = $1 AND project_id = $2
            RETURNING {}
            "#,
            slot.column(),
            CARD_SET_COLUMNS
        ))
        .bind(user_id)
        .bind(project_id)
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        match row {
            Some(row) => card_set_from_row(&row).map_err(DatabaseError::Query),
            None => Err(DatabaseError::Query(sqlx::Error::RowNotFound)),
        }
    }

    async fn get_card_set(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> DatabaseResult<Option<CardSet>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_card_sets WHERE user_id = $1 AND project_id = $2",
            CARD_SET_COLUMNS
        ))
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(card_set_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn get_card_set_view(&self, code: &str) -> DatabaseResult<Option<CardSetView>> {
        let row = sqlx::query(
            r#"
            SELECT s.code, s.project_id,
                   al.id AS logo_id, al.url AS logo_url,
                   ac.id AS card_id, ac.url AS card_url,
                   av.id AS video_id, av.url AS video_url
            FROM user_card_sets s
            LEFT JOIN assets al ON al.id = s.logo_asset_id
            LEFT JOIN assets ac ON ac.id = s.card_image_asset_id
            LEFT JOIN assets av ON av.id = s.video_asset_id
            WHERE s.code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        let Some(row) = row else {
            return Ok(None);
        };

        card_set_view_from_row(&row)
            .map(Some)
            .map_err(DatabaseError::Query)
    }

    async fn delete_card_sets_by_project(&self, project_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM user_card_sets WHERE project_id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected())
    }
}
