use anyhow::Result;
use std::{env, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod credentials;
mod error;
mod middleware;
mod rate_limiter;
mod routes;
mod validation;

use axum::http::{HeaderValue, Method, header};
use common::{
    database,
    jwt::{JwtConfig, JwtService},
    store::{MetadataStore, PgMetadataStore},
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn MetadataStore>,
    pub jwt_service: JwtService,
    pub rate_limiter: RateLimiter,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    pub cookie_secure: bool,
}

fn cors_layer() -> Result<CorsLayer> {
    let origins = env::var("CLIENT_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .map(|origin| origin.trim().parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?);
    let rate_limiter = RateLimiter::new(RateLimiterConfig::from_env());
    let cookie_secure = env::var("COOKIE_SECURE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let app_state = AppState {
        pool: pool.clone(),
        store: Arc::new(PgMetadataStore::new(pool.clone())),
        jwt_service,
        rate_limiter,
        cookie_secure,
    };

    info!("Authentication service initialized successfully");

    let app = routes::create_router(app_state)
        .layer(cors_layer()?)
        .layer(TraceLayer::new_for_http());

    let bind_address = env::var("AUTH_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:4000".to_string());
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Authentication service listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    database::close_pool(&pool).await;
    info!("Authentication service stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM so the pool is closed before exit
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
