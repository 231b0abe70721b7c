//! Stockroom Server
//!
//! REST JSON API for a laboratory equipment stockroom: inventory,
//! reservation requests, the borrow lifecycle, and return deficiency
//! tracking.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
