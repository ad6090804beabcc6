//! HTTP handlers
//!
//! One module per route group; each exposes a `router()` that
//! [`crate::router::build_router`] mounts under its prefix:
//! - `public`: service info, health, email preferences, Messenger webhook
//! - `auth`: Supabase Google sign-in
//! - `admin` and `scheduler`: dashboard, volunteer actions and job triggers
//! - `settings`: runtime settings CRUD
//! - `agent`: direct chat assistant access

pub mod admin;
pub mod agent;
pub mod auth;
pub mod pages;
pub mod public;
pub mod scheduler;
pub mod settings;
