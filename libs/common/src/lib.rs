//! Common library for the AR business card backend
//!
//! This crate provides the pieces shared by the auth and API services:
//! database connectivity and migrations, the metadata store, the blob store
//! backends, domain models, error types and JWT handling.

pub mod blob;
pub mod database;
pub mod error;
pub mod jwt;
pub mod models;
pub mod store;

/// Example wiring of the shared infrastructure
///
/// ```rust,no_run
/// use common::blob::{StorageConfig, build_blob_store};
/// use common::database::{DatabaseConfig, init_pool, run_migrations};
/// use common::store::PgMetadataStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
///     run_migrations(&pool).await?;
///     let _store = PgMetadataStore::new(pool);
///     let _blobs = build_blob_store(&StorageConfig::from_env()?).await?;
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
