//! Utility modules
//!
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, and helper functions.

pub mod errors;
pub mod logging;
pub mod helpers;
pub mod retry;
pub mod sheets_url;
pub mod template;

pub use errors::{SchedulerError, Result};
pub use retry::RetryPolicy;
