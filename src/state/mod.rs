//! Shared application state handed to every axum handler

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use crate::config::settings::Settings;
use crate::middleware::rate_limit::PublicRateLimiter;
use crate::services::ServiceFactory;

pub const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Cheap to clone; everything heavy sits behind `Arc`
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub services: Arc<ServiceFactory>,
    pub public_limiter: Arc<PublicRateLimiter>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: ServiceFactory) -> Self {
        let settings = Arc::new(services.settings.clone());
        let public_limiter = Arc::new(PublicRateLimiter::per_minute(settings.features.public_rate_limit_per_minute));
        Self {
            settings,
            services: Arc::new(services),
            public_limiter,
            started_at: Utc::now(),
        }
    }

    /// Drop idle keys from the public and chatbot rate limiters
    pub fn prune_rate_limits(&self) {
        self.public_limiter.retain_recent();
        self.services.agent.cleanup_rate_limits();
        debug!("Pruned idle rate limit entries");
    }

    /// Periodically prune the rate limiters until the returned handle is aborted
    pub fn spawn_rate_limit_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        let handle = tokio::spawn(async move {
            let mut cleanup_interval = tokio::time::interval(every);
            loop {
                cleanup_interval.tick().await;
                state.prune_rate_limits();
            }
        });
        info!(interval_secs = every.as_secs(), "Started rate limit cleanup task");
        handle
    }
}
