//! AR business card API service
//!
//! Project lifecycle, uploads, AR page generation and the read APIs consumed
//! by the dashboard and the AR client.

pub mod access;
pub mod ar_view;
pub mod config;
pub mod dto;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod templates;
pub mod validation;

pub use state::AppState;
