//! Request authentication
//!
//! Tokens come from the `token` cookie or a Bearer header and are validated
//! with the shared HS256 secret. Protected routes get the current `User`;
//! every route behind either middleware gets a `RequesterContext`.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use common::models::User;
use tracing::{debug, error, warn};

use crate::{
    AppState,
    access::RequesterContext,
    error::{ApiError, ApiResult},
};

pub const TOKEN_COOKIE: &str = "token";
pub const API_KEY_HEADER: &str = "x-api-key";

pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn api_key_valid(state: &AppState, headers: &HeaderMap) -> bool {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    state.config.api_key_matches(provided)
}

/// Resolve a token to its user: by id first, then by the email it was issued for
async fn load_user(state: &AppState, token: &str) -> ApiResult<User> {
    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        warn!("Rejected token: {}", e);
        ApiError::Unauthorized
    })?;

    let by_id = state.store.find_user_by_id(claims.sub).await.map_err(|e| {
        error!("Failed to load user {}: {}", claims.sub, e);
        ApiError::Internal
    })?;
    if let Some(user) = by_id {
        return Ok(user);
    }

    state
        .store
        .find_user_by_email(&claims.email)
        .await
        .map_err(|e| {
            error!("Failed to load user {}: {}", claims.email, e);
            ApiError::Internal
        })?
        .ok_or(ApiError::Unauthorized)
}

/// Reject requests without a valid token
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&jar, req.headers()).ok_or(ApiError::Unauthorized)?;
    let user = load_user(&state, &token).await?;

    let ctx = RequesterContext::for_user(&user).with_api_key(api_key_valid(&state, req.headers()));
    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Attach whatever identity the request carries; anonymous is fine
pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let mut ctx = RequesterContext::anonymous();
    if let Some(token) = extract_token(&jar, req.headers()) {
        match load_user(&state, &token).await {
            Ok(user) => ctx = RequesterContext::for_user(&user),
            Err(ApiError::Unauthorized) => debug!("Ignoring invalid token on public route"),
            Err(e) => return Err(e),
        }
    }

    let ctx = ctx.with_api_key(api_key_valid(&state, req.headers()));
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_cookie_then_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));

        let jar = CookieJar::new().add(Cookie::new(TOKEN_COOKIE, "cookie-token"));
        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("cookie-token"));
        assert_eq!(
            extract_token(&CookieJar::new(), &headers).as_deref(),
            Some("header-token")
        );

        let empty = CookieJar::new().add(Cookie::new(TOKEN_COOKIE, ""));
        assert_eq!(extract_token(&empty, &HeaderMap::new()), None);
    }
}
