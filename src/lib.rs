//! Vietnam Hearts volunteer scheduler
//!
//! Keeps the volunteer roster in sync with the signup sheet, sends
//! confirmation and weekly reminder emails, rotates the weekly schedule
//! sheets, serves the admin dashboard and answers Messenger/Instagram
//! messages through a small assistant.

#![allow(non_snake_case)]

pub mod agent;
pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{Result, SchedulerError};

pub use database::DatabaseService;
pub use router::build_router;
pub use services::ServiceFactory;
pub use state::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
