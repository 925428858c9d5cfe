//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{error, warn};

use crate::{AppState, error::AuthError, routes::TOKEN_COOKIE};

/// Read the token from the `token` cookie, falling back to a Bearer header
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

/// Validate the token and attach the current user to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(&jar, req.headers()).ok_or(AuthError::Unauthorized)?;

    let claims = state.jwt_service.validate_token(&token).map_err(|e| {
        warn!("Rejected token: {}", e);
        AuthError::Unauthorized
    })?;

    let user = state
        .store
        .find_user_by_id(claims.sub)
        .await
        .map_err(|e| {
            error!("Failed to load user {}: {}", claims.sub, e);
            AuthError::InternalServerError
        })?
        .ok_or(AuthError::Unauthorized)?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_cookie_wins_over_header() {
        let jar = CookieJar::new().add(Cookie::new(TOKEN_COOKIE, "from-cookie"));
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("from-cookie"));
        assert_eq!(
            extract_token(&CookieJar::new(), &headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&CookieJar::new(), &headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&CookieJar::new(), &headers), None);
    }
}
