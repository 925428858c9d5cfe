//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
};
use common::{
    database,
    models::{AssetFilter, CardSetView, CardSlot, MAX_PAGE_SIZE, ProjectUpdate, User},
};
use serde_json::{Value, json};
use std::path::Path as FsPath;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    access::RequesterContext,
    ar_view::AR_ROOT,
    dto::{
        ArListQuery, AssetListQuery, AssetResponse, CardSetResponse, CreateProjectRequest,
        LatestAssetsResponse, ProjectIdQuery, ProjectResponse, TemplateProjectRequest,
        TypedAssetResponse, UploadResponse, UserSummary,
    },
    error::{ApiError, ApiResult},
    lifecycle::{UploadOutcome, UploadRequest},
    middleware::{optional_auth, require_auth},
    templates::TEMPLATES,
    validation::{MAX_FINAL_BYTES, UploadRole, validate_upload},
};

/// Largest request body accepted, the final-step limit plus multipart overhead
const BODY_LIMIT: usize = MAX_FINAL_BYTES + 1024 * 1024;

const DEFAULT_AR_LIST_LIMIT: i64 = 50;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/v1/projects",
            get(list_my_projects).post(create_project),
        )
        .route(
            "/api/v1/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/v1/projects/template", post(create_project_from_template))
        .route("/api/v1/projects/:id/assets", post(upload_project_asset))
        .route("/api/v1/projects/business-card/logo", post(upload_logo))
        .route("/api/v1/projects/business-card/card", post(upload_card))
        .route("/api/v1/projects/business-card/final", post(upload_final))
        .route("/api/v1/assets/my", get(my_assets))
        .route("/api/v1/assets/my/images", get(my_images))
        .route("/api/v1/assets/my/videos", get(my_videos))
        .route("/api/v1/assets/my/latest", get(my_latest))
        .route("/api/v1/assets/user/:user_id", get(admin_user_assets))
        .route("/api/v1/assets/user/:user_id/latest", get(admin_user_latest))
        .route("/api/v1/ar/generate/:id", post(generate_ar_view))
        .route("/api/v1/storage/:project_id", get(list_storage))
        .route("/api/v1/admin/users", get(admin_list_users))
        .route("/api/v1/admin/users/:id", delete(admin_delete_user))
        .route("/api/v1/admin/users/:id/projects", get(admin_user_projects))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/api/v1/projects/xr/:code", get(xr_card_set))
        .route("/api/v1/projects/xr/:code/:slot", get(xr_slot))
        .route("/api/v1/ar/projects", get(ar_list_projects))
        .route("/api/v1/ar/projects/:id", get(ar_get_project))
        .route("/api/v1/ar/projects/:id/scene", get(ar_scene))
        .route("/api/v1/ar/projects/:id/assets", get(ar_assets))
        .route("/api/v1/ar/check/:id", get(check_ar_view))
        .route_layer(from_fn_with_state(state.clone(), optional_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/templates", get(list_templates))
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Serve `app` until `shutdown` resolves, letting in-flight requests finish
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Static serving of the filesystem blob root and the generated AR pages
pub fn static_files(root: &FsPath) -> Router {
    Router::new()
        .nest_service("/uploads", ServeDir::new(root))
        .nest_service("/ar-view", ServeDir::new(root.join(AR_ROOT)))
}

fn ok(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn list_response(data: impl serde::Serialize, count: usize, filter: &AssetFilter) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "pagination": {
            "count": count,
            "limit": filter.limit,
            "offset": filter.offset,
        }
    }))
}

fn require_admin(user: &User) -> ApiResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = match &state.pool {
        Some(pool) => Some(database::health_check(pool).await.unwrap_or(false)),
        None => None,
    };
    let healthy = database_ok.unwrap_or(true);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "api-service",
            "database": database_ok,
        })),
    )
}

// Projects

pub async fn list_my_projects(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<Value>> {
    let projects = state.store.list_projects_by_owner(user.id).await?;
    let data: Vec<_> = projects.iter().map(ProjectResponse::summary).collect();
    Ok(ok(data))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let project = state
        .lifecycle
        .create_project(&user, &payload.name, payload.description, payload.thumbnail)
        .await?;
    Ok((StatusCode::CREATED, ok(ProjectResponse::full(&project))))
}

pub async fn list_templates() -> Json<Value> {
    ok(TEMPLATES)
}

pub async fn create_project_from_template(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<TemplateProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let project = state
        .lifecycle
        .create_from_template(&user, &payload.template_id, payload.owner)
        .await?;
    Ok((StatusCode::CREATED, ok(ProjectResponse::full(&project))))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = state.lifecycle.readable_project(id, &ctx).await?;
    Ok(ok(ProjectResponse::full(&project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
    Json(update): Json<ProjectUpdate>,
) -> ApiResult<Json<Value>> {
    let project = state.lifecycle.update_project(id, &ctx, update).await?;
    Ok(ok(ProjectResponse::full(&project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.lifecycle.delete_project(id, &ctx).await?;
    Ok(ok(json!({})))
}

// Uploads

struct FilePart {
    bytes: Vec<u8>,
    filename: String,
    mime: String,
}

#[derive(Default)]
struct UploadForm {
    file: Option<FilePart>,
    project_id: Option<Uuid>,
}

/// Read the first file among `file_fields` and an optional `projectId` field
async fn read_upload_form(mut multipart: Multipart, file_fields: &[&str]) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if form.file.is_none() && file_fields.contains(&name.as_str()) {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read file: {e}")))?;
            form.file = Some(FilePart {
                bytes: bytes.to_vec(),
                filename,
                mime,
            });
        } else if name == "projectId" {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Multipart error: {e}")))?;
            let text = text.trim();
            if !text.is_empty() {
                let id = text
                    .parse()
                    .map_err(|_| ApiError::Validation("Invalid projectId".to_string()))?;
                form.project_id = Some(id);
            }
        }
    }

    Ok(form)
}

fn next_step_url(state: &AppState, outcome: &UploadOutcome) -> Option<String> {
    outcome.next_step.map(|step| {
        format!(
            "{}/business-card/{}?projectId={}",
            state.config.client_url.trim_end_matches('/'),
            step,
            outcome.project_id
        )
    })
}

async fn store_upload(
    state: &AppState,
    ctx: &RequesterContext,
    project_id: Uuid,
    file: FilePart,
    role: Option<UploadRole>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let outcome = state
        .lifecycle
        .upload_asset(
            project_id,
            ctx,
            UploadRequest {
                bytes: file.bytes,
                mime: file.mime,
                filename: file.filename,
                role,
            },
        )
        .await?;

    let response = UploadResponse {
        asset_id: outcome.asset.id,
        typed_asset_id: outcome.typed_asset_id,
        project_id: outcome.project_id,
        asset_type: outcome.asset.asset_type,
        url: outcome.asset.url.clone(),
        role: role.map(|r| r.to_string()),
        next_step_url: next_step_url(state, &outcome),
        warning: outcome.warning.clone(),
    };
    Ok((StatusCode::CREATED, ok(response)))
}

fn required_file(form: &mut UploadForm, what: &str) -> ApiResult<FilePart> {
    form.file
        .take()
        .ok_or_else(|| ApiError::Validation(format!("Please upload a {}", what)))
}

fn required_project(query: &ProjectIdQuery, form: &UploadForm) -> ApiResult<Uuid> {
    query
        .project_id
        .or(form.project_id)
        .ok_or_else(|| ApiError::Validation("projectId is required".to_string()))
}

/// First wizard step; starts a new business-card project when no id is given
pub async fn upload_logo(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(ctx): Extension<RequesterContext>,
    Query(query): Query<ProjectIdQuery>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = read_upload_form(multipart, &["logo", "image"]).await?;
    let file = required_file(&mut form, "logo")?;

    let project_id = match query.project_id.or(form.project_id) {
        Some(id) => id,
        None => {
            // Reject bad files before creating anything
            validate_upload(
                Some(UploadRole::Logo),
                &file.mime,
                &file.filename,
                file.bytes.len(),
            )
            .map_err(ApiError::Validation)?;
            let project = state.lifecycle.start_business_card(&user).await?;
            info!("Started business card project {} for {}", project.id, user.id);
            project.id
        }
    };

    store_upload(&state, &ctx, project_id, file, Some(UploadRole::Logo)).await
}

pub async fn upload_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Query(query): Query<ProjectIdQuery>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = read_upload_form(multipart, &["card", "image"]).await?;
    let file = required_file(&mut form, "card image")?;
    let project_id = required_project(&query, &form)?;
    store_upload(&state, &ctx, project_id, file, Some(UploadRole::Card)).await
}

pub async fn upload_final(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Query(query): Query<ProjectIdQuery>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = read_upload_form(multipart, &["final", "video", "model"]).await?;
    let file = required_file(&mut form, "video or GLB model")?;
    let project_id = required_project(&query, &form)?;
    store_upload(&state, &ctx, project_id, file, Some(UploadRole::Final)).await
}

/// Editor upload without a wizard role
pub async fn upload_project_asset(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = read_upload_form(multipart, &["file", "image"]).await?;
    let file = required_file(&mut form, "file")?;
    store_upload(&state, &ctx, id, file, None).await
}

// Asset listings

pub async fn my_assets(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.to_filter()?;
    let assets = state.store.list_assets_by_user(user.id, &filter).await?;
    let data: Vec<_> = assets.iter().map(AssetResponse::from).collect();
    Ok(list_response(&data, data.len(), &filter))
}

pub async fn my_images(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.to_filter()?;
    let images = state.store.list_image_assets_by_user(user.id, &filter).await?;
    let data: Vec<_> = images.iter().map(TypedAssetResponse::from).collect();
    Ok(list_response(&data, data.len(), &filter))
}

pub async fn my_videos(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.to_filter()?;
    let videos = state.store.list_video_assets_by_user(user.id, &filter).await?;
    let data: Vec<_> = videos.iter().map(TypedAssetResponse::from).collect();
    Ok(list_response(&data, data.len(), &filter))
}

async fn latest_for(
    state: &AppState,
    user_id: Uuid,
    project_id: Option<Uuid>,
) -> ApiResult<LatestAssetsResponse> {
    let image = state.store.get_latest_image_by_user(user_id, project_id).await?;
    let video = state.store.get_latest_video_by_user(user_id, project_id).await?;
    Ok(LatestAssetsResponse {
        image: image.as_ref().map(TypedAssetResponse::from),
        video: video.as_ref().map(TypedAssetResponse::from),
    })
}

pub async fn my_latest(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ProjectIdQuery>,
) -> ApiResult<Json<Value>> {
    Ok(ok(latest_for(&state, user.id, query.project_id).await?))
}

async fn existing_user(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

pub async fn admin_user_assets(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let filter = query.to_filter()?;
    let target = existing_user(&state, user_id).await?;
    let assets = state.store.list_assets_by_user(target.id, &filter).await?;
    let data: Vec<_> = assets.iter().map(AssetResponse::from).collect();
    Ok(list_response(&data, data.len(), &filter))
}

pub async fn admin_user_latest(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ProjectIdQuery>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let target = existing_user(&state, user_id).await?;
    Ok(ok(latest_for(&state, target.id, query.project_id).await?))
}

// AR view

pub async fn check_ar_view(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = state.lifecycle.readable_project(id, &ctx).await?;
    let ar_view = state.lifecycle.ar_view();
    let exists = ar_view.exists(project.id).await?;

    Ok(ok(json!({
        "projectId": project.id,
        "exists": exists,
        "url": exists.then(|| ar_view.public_url(project.id)),
    })))
}

pub async fn generate_ar_view(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let artifact = state.lifecycle.generate_ar_view(id, &ctx).await?;
    Ok((
        StatusCode::CREATED,
        ok(json!({
            "projectId": id,
            "key": artifact.key,
            "url": artifact.url,
        })),
    ))
}

// XR card set lookups

async fn readable_card_set(
    state: &AppState,
    code: &str,
    ctx: &RequesterContext,
) -> ApiResult<CardSetView> {
    let view = state
        .store
        .get_card_set_view(code)
        .await?
        .ok_or_else(|| ApiError::not_found("Card set"))?;
    state.lifecycle.readable_project(view.project_id, ctx).await?;
    Ok(view)
}

pub async fn xr_card_set(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    let view = readable_card_set(&state, &code, &ctx).await?;
    Ok(ok(CardSetResponse::from(&view)))
}

pub async fn xr_slot(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path((code, slot_name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let slot: CardSlot = slot_name.parse().map_err(ApiError::Validation)?;
    let view = readable_card_set(&state, &code, &ctx).await?;
    let asset = view
        .slot(slot)
        .ok_or_else(|| ApiError::NotFound(format!("No {} asset for {}", slot_name, code)))?;

    Ok(ok(json!({
        "code": view.code,
        "projectId": view.project_id,
        "slot": slot_name,
        "assetId": asset.asset_id,
        "url": asset.url,
    })))
}

// Public AR data

pub async fn ar_list_projects(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Query(query): Query<ArListQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AR_LIST_LIMIT)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let all = query.all.as_deref() == Some("1");

    let projects = match query.owner {
        Some(owner) if all && ctx.api_key_valid => state.store.list_projects_by_owner(owner).await?,
        owner => state.store.list_public_projects(owner, limit, offset).await?,
    };

    let data: Vec<_> = projects.iter().map(ProjectResponse::summary).collect();
    Ok(ok(data))
}

pub async fn ar_get_project(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut project = state.lifecycle.readable_project(id, &ctx).await?;

    match state.store.record_project_view(project.id).await {
        Ok(()) => project.view_count += 1,
        Err(e) => warn!("Failed to record view of project {}: {}", project.id, e),
    }

    Ok(ok(ProjectResponse::full(&project)))
}

pub async fn ar_scene(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = state.lifecycle.readable_project(id, &ctx).await?;
    Ok(ok(json!({
        "sceneData": project.scene_data,
        "updatedAt": project.updated_at,
    })))
}

pub async fn ar_assets(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = state.lifecycle.readable_project(id, &ctx).await?;
    let filter = AssetFilter {
        limit: MAX_PAGE_SIZE,
        ..Default::default()
    };
    let assets = state.store.list_assets_by_project(project.id, &filter).await?;
    let assets: Vec<_> = assets.iter().map(AssetResponse::from).collect();

    Ok(ok(json!({
        "assets": assets,
        "updatedAt": project.updated_at,
    })))
}

// Storage

pub async fn list_storage(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequesterContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let keys = state.lifecycle.list_project_blobs(project_id, &ctx).await?;
    let data: Vec<_> = keys
        .iter()
        .map(|key| json!({ "key": key, "url": state.blobs.public_url(key) }))
        .collect();
    Ok(ok(data))
}

// Admin

pub async fn admin_list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let users = state.store.list_users().await?;
    let data: Vec<_> = users.iter().map(UserSummary::from).collect();
    Ok(ok(data))
}

pub async fn admin_delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(ctx): Extension<RequesterContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    if id == user.id {
        return Err(ApiError::Validation(
            "Admins cannot delete their own account".to_string(),
        ));
    }
    state.lifecycle.delete_user(id, &ctx).await?;
    Ok(ok(json!({})))
}

pub async fn admin_user_projects(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;
    let target = existing_user(&state, id).await?;
    let projects = state.store.list_projects_by_owner(target.id).await?;
    let data: Vec<_> = projects.iter().map(ProjectResponse::summary).collect();
    Ok(ok(data))
}
