use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{AppState, config::AppConfig, routes};
use axum::http::{HeaderName, HeaderValue, Method, header};
use common::{
    blob::{BlobStoreMode, StorageConfig, build_blob_store},
    database,
    jwt::{JwtConfig, JwtService},
    store::PgMetadataStore,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(config: &AppConfig) -> Result<CorsLayer> {
    let origins = config
        .cors_origins()
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = AppConfig::load()?;

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

    let storage_config = StorageConfig::from_env()?;
    let blobs = build_blob_store(&storage_config).await?;
    let jwt_service = JwtService::new(JwtConfig::from_env()?);

    let cors = cors_layer(&config)?;
    let bind_address = config.bind_address();

    let state = AppState::new(
        Arc::new(PgMetadataStore::new(pool.clone())),
        blobs,
        jwt_service,
        config,
    )
    .with_pool(pool.clone());

    let mut app = routes::create_router(state);
    if storage_config.mode == BlobStoreMode::Local {
        info!("Serving local blobs from {}", storage_config.root.display());
        app = app.merge(routes::static_files(&storage_config.root));
    }
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    info!("API service initialized successfully");

    let listener = TcpListener::bind(&bind_address).await?;
    info!("API service listening on {}", bind_address);

    routes::serve(listener, app, shutdown_signal()).await?;

    database::close_pool(&pool).await;
    info!("API service stopped");
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
