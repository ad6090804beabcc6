//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the scheduler application.

use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{SchedulerError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard must be held for the lifetime of the process so the
/// background file writer flushes on shutdown.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory)?;

    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| SchedulerError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log volunteer lifecycle actions
pub fn log_volunteer_action(volunteer_id: i64, action: &str, details: Option<&str>) {
    info!(
        volunteer_id = volunteer_id,
        action = action,
        details = details,
        "Volunteer action performed"
    );
}

/// Log an email send attempt
pub fn log_email_event(recipient: &str, email_type: &str, status: &str, error: Option<&str>) {
    if error.is_some() {
        warn!(
            recipient = recipient,
            email_type = email_type,
            status = status,
            error = error,
            "Email delivery failed"
        );
    } else {
        info!(
            recipient = recipient,
            email_type = email_type,
            status = status,
            "Email processed"
        );
    }
}

/// Log the outcome of a signup sheet sync
pub fn log_sync_summary(retrieved: usize, accepted: usize, created: usize, failed: usize) {
    info!(
        submissions_retrieved = retrieved,
        accepted_submissions = accepted,
        volunteers_created = created,
        failed_submissions = failed,
        "Volunteer sync completed"
    );
}

/// Log admin actions
pub fn log_admin_action(admin_email: &str, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_email = admin_email,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log chatbot traffic
pub fn log_chat_message(platform: &str, user_id: &str, intent: &str, confidence: f64, escalated: bool) {
    debug!(
        platform = platform,
        user_id = user_id,
        intent = intent,
        confidence = confidence,
        escalated = escalated,
        "Chat message processed"
    );
}
