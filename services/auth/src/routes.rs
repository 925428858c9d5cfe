//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::{DateTime, Utc};
use common::{
    database,
    error::DatabaseError,
    models::{NewUser, User, UserRole, UserUpdate},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{AppState, credentials, error::AuthError, middleware::auth_middleware, validation};

/// Name of the HTTP-only session cookie
pub const TOKEN_COOKIE: &str = "token";

/// Request for user registration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub agreed_to_privacy_policy: bool,
}

/// Request for user login
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Profile or password change; absent fields stay as they are
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Public view of a user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/users/:id", put(update_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn token_cookie(token: String, max_age_seconds: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(max_age_seconds).unwrap_or(i64::MAX),
        ))
        .build()
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = database::health_check(&state.pool).await.unwrap_or(false);
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database_ok { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database_ok,
        })),
    )
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalize_email(&payload.email);
    validation::validate_registration(
        &payload.first_name,
        &payload.last_name,
        &email,
        &payload.password,
        &payload.confirm_password,
        payload.agreed_to_privacy_policy,
    )
    .map_err(AuthError::Validation)?;

    let existing = state.store.find_user_by_email(&email).await.map_err(|e| {
        error!("Failed to look up user by email: {}", e);
        AuthError::InternalServerError
    })?;
    if existing.is_some() {
        return Err(AuthError::Conflict);
    }

    let password_hash = credentials::hash_password(&payload.password).map_err(|e| {
        error!("{}", e);
        AuthError::InternalServerError
    })?;

    let new_user = NewUser {
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email,
        role: UserRole::User,
        password_hash,
        agreed_privacy: payload.agreed_to_privacy_policy,
    };

    // A concurrent registration can still win the race on the unique index
    let user = state
        .store
        .create_user(&new_user)
        .await
        .map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => AuthError::Conflict,
            other => {
                error!("Failed to create user: {}", other);
                AuthError::InternalServerError
            }
        })?;

    info!("Registered user {}", user.id);

    let token = state.jwt_service.generate_token(&user, false).map_err(|e| {
        error!("Failed to generate token: {}", e);
        AuthError::InternalServerError
    })?;
    let jar = jar.add(token_cookie(
        token.clone(),
        state.jwt_service.token_expiry(false),
        state.cookie_secure,
    ));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "token": token,
            "data": UserResponse::from(&user),
        })),
    ))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalize_email(&payload.email);
    validation::validate_email(&email).map_err(AuthError::Validation)?;
    if payload.password.is_empty() {
        return Err(AuthError::Validation(
            "Please provide an email and password".to_string(),
        ));
    }

    if !state.rate_limiter.is_allowed(&email).await {
        return Err(AuthError::TooManyRequests);
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| {
            error!("Failed to look up user by email: {}", e);
            AuthError::InternalServerError
        })?
        .ok_or(AuthError::InvalidCredentials)?;

    let valid = credentials::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!("Stored password hash for {} is unusable: {}", user.id, e);
        AuthError::InternalServerError
    })?;
    if !valid {
        warn!("Failed login for {}", user.id);
        return Err(AuthError::InvalidCredentials);
    }

    state.rate_limiter.reset(&email).await;

    let token = state
        .jwt_service
        .generate_token(&user, payload.remember_me)
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            AuthError::InternalServerError
        })?;
    let jar = jar.add(token_cookie(
        token.clone(),
        state.jwt_service.token_expiry(payload.remember_me),
        state.cookie_secure,
    ));

    info!("User {} logged in", user.id);

    Ok((
        StatusCode::OK,
        jar,
        Json(json!({
            "success": true,
            "token": token,
            "data": UserResponse::from(&user),
        })),
    ))
}

/// Logout endpoint
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (
        StatusCode::OK,
        jar,
        Json(json!({"success": true, "message": "Logged out successfully"})),
    )
}

/// Current user endpoint
pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": UserResponse::from(&user),
    }))
}

/// Turn a change request into a store update, enforcing who may change what
///
/// Users edit their own account; admins edit any account and are the only
/// ones who may change a role. A new password is re-hashed here.
fn build_user_update(
    requester: &User,
    target_id: Uuid,
    request: UpdateUserRequest,
) -> Result<UserUpdate, AuthError> {
    if requester.id != target_id && !requester.is_admin() {
        return Err(AuthError::Forbidden);
    }
    if request.role.is_some() && !requester.is_admin() {
        return Err(AuthError::Forbidden);
    }

    let mut update = UserUpdate {
        role: request.role,
        ..Default::default()
    };

    if let Some(first_name) = request.first_name {
        validation::validate_name("First name", &first_name).map_err(AuthError::Validation)?;
        update.first_name = Some(first_name.trim().to_string());
    }
    if let Some(last_name) = request.last_name {
        validation::validate_name("Last name", &last_name).map_err(AuthError::Validation)?;
        update.last_name = Some(last_name.trim().to_string());
    }
    if let Some(email) = request.email {
        let email = normalize_email(&email);
        validation::validate_email(&email).map_err(AuthError::Validation)?;
        update.email = Some(email);
    }
    if let Some(password) = request.password.filter(|p| !p.is_empty()) {
        validation::validate_password(&password).map_err(AuthError::Validation)?;
        if request
            .confirm_password
            .as_deref()
            .is_some_and(|confirm| confirm != password)
        {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        let password_hash = credentials::hash_password(&password).map_err(|e| {
            error!("{}", e);
            AuthError::InternalServerError
        })?;
        update.password_hash = Some(password_hash);
    }

    Ok(update)
}

/// Profile and password change endpoint
pub async fn update_user(
    State(state): State<AppState>,
    Extension(requester): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let update = build_user_update(&requester, id, payload)?;

    let result = if update.is_empty() {
        state.store.find_user_by_id(id).await
    } else {
        state.store.update_user(id, &update).await
    };
    let user = result
        .map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => AuthError::Conflict,
            other => {
                error!("Failed to update user {}: {}", id, other);
                AuthError::InternalServerError
            }
        })?
        .ok_or(AuthError::NotFound)?;

    if update.password_hash.is_some() {
        info!("User {} changed the password of {}", requester.id, user.id);
    } else {
        info!("User {} updated the profile of {}", requester.id, user.id);
    }

    Ok(Json(json!({
        "success": true,
        "data": UserResponse::from(&user),
    })))
}
