//! Slotwise booking engine
//!
//! Generates bookable time slots from business opening hours, keeps an
//! exact per-slot capacity ledger and drives the booking lifecycle over a
//! REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod slots;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
