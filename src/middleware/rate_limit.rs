//! Rate limiting
//!
//! Two limiters live here: a keyed GCRA limiter (governor) guarding the
//! public HTTP routes per client address, and a sliding-window limiter that
//! caps how many chatbot messages a single sender may push through.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::state::AppState;
use crate::utils::errors::{Result, SchedulerError};

/// One window of a sliding-window limit
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowLimit {
    pub max_requests: u32,
    #[serde(with = "duration_secs")]
    pub window: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

impl WindowLimit {
    pub fn per_minute(max_requests: u32) -> Self {
        Self { max_requests, window: Duration::from_secs(60) }
    }

    pub fn per_hour(max_requests: u32) -> Self {
        Self { max_requests, window: Duration::from_secs(3600) }
    }
}

/// Per-key request log checked against every configured window
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    limits: Vec<WindowLimit>,
    entries: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowUsage {
    pub limit: WindowLimit,
    pub current_requests: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatistics {
    pub tracked_keys: usize,
    pub active_keys: usize,
    pub keys_at_limit: usize,
    pub limits: Vec<WindowLimit>,
}

impl SlidingWindowLimiter {
    pub fn new(limits: Vec<WindowLimit>) -> Self {
        Self {
            limits,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn longest_window(&self) -> Duration {
        self.limits.iter().map(|l| l.window).max().unwrap_or(Duration::ZERO)
    }

    fn count_within(requests: &[Instant], window: Duration, now: Instant) -> u32 {
        requests.iter().filter(|t| now.duration_since(**t) < window).count() as u32
    }

    /// Record a request for `key`, or fail when any window is already full
    pub fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();
        let longest = self.longest_window();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SchedulerError::ServiceUnavailable("rate limiter unavailable".to_string()))?;
        let requests = entries.entry(key.to_string()).or_default();
        requests.retain(|t| now.duration_since(*t) < longest);

        for limit in &self.limits {
            if Self::count_within(requests, limit.window, now) >= limit.max_requests {
                warn!(key = key, window_secs = limit.window.as_secs(), "Rate limit exceeded");
                return Err(SchedulerError::RateLimitExceeded);
            }
        }

        requests.push(now);
        debug!(key = key, "Rate limit check passed");
        Ok(())
    }

    pub fn status(&self, key: &str) -> Vec<WindowUsage> {
        let now = Instant::now();
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let requests = entries.get(key).map(Vec::as_slice).unwrap_or(&[]);
        self.limits
            .iter()
            .map(|limit| {
                let current_requests = Self::count_within(requests, limit.window, now);
                WindowUsage {
                    limit: *limit,
                    current_requests,
                    remaining: limit.max_requests.saturating_sub(current_requests),
                }
            })
            .collect()
    }

    pub fn clear(&self, key: &str) -> bool {
        let removed = self
            .entries
            .lock()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false);
        if removed {
            info!(key = key, "Rate limit cleared");
        }
        removed
    }

    /// Drop keys with no request inside the longest window
    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let longest = self.longest_window();
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, requests| requests.iter().any(|t| now.duration_since(*t) < longest));
            debug!(remaining_entries = entries.len(), "Cleaned up rate limit entries");
        }
    }

    pub fn statistics(&self) -> RateLimitStatistics {
        let now = Instant::now();
        let longest = self.longest_window();
        let (tracked_keys, active_keys, keys_at_limit) = match self.entries.lock() {
            Ok(entries) => {
                let active = entries
                    .values()
                    .filter(|r| r.iter().any(|t| now.duration_since(*t) < longest))
                    .count();
                let at_limit = entries
                    .values()
                    .filter(|r| {
                        self.limits
                            .iter()
                            .any(|l| Self::count_within(r, l.window, now) >= l.max_requests)
                    })
                    .count();
                (entries.len(), active, at_limit)
            }
            Err(_) => (0, 0, 0),
        };
        RateLimitStatistics {
            tracked_keys,
            active_keys,
            keys_at_limit,
            limits: self.limits.clone(),
        }
    }
}

/// Keyed limiter for unauthenticated routes
pub struct PublicRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl PublicRateLimiter {
    pub fn per_minute(max_requests: u32) -> Self {
        let burst = NonZeroU32::new(max_requests.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(burst)),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

/// Client address for rate limiting. Proxy headers are honoured only when
/// `trust_proxy_headers` is set; otherwise the socket peer is used.
pub fn client_key(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let headers = request.headers();
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
        if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn public_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request, state.settings.server.trust_proxy_headers);
    if state.public_limiter.check(&key) {
        next.run(request).await
    } else {
        warn!(client = %key, path = %request.uri().path(), "Public rate limit exceeded");
        SchedulerError::RateLimitExceeded.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::Body;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_sliding_window_basic() {
        let limiter = SlidingWindowLimiter::new(vec![WindowLimit::per_minute(3), WindowLimit::per_hour(100)]);

        assert_ok!(limiter.check("sender-1"));
        assert_ok!(limiter.check("sender-1"));
        assert_ok!(limiter.check("sender-1"));
        assert_matches!(limiter.check("sender-1"), Err(SchedulerError::RateLimitExceeded));

        // other senders are unaffected
        assert_ok!(limiter.check("sender-2"));
    }

    #[test]
    fn test_hour_window_applies() {
        let limiter = SlidingWindowLimiter::new(vec![WindowLimit::per_minute(10), WindowLimit::per_hour(2)]);
        assert_ok!(limiter.check("s"));
        assert_ok!(limiter.check("s"));
        assert_err!(limiter.check("s"));
    }

    #[test]
    fn test_window_expiry() {
        let limiter = SlidingWindowLimiter::new(vec![WindowLimit {
            max_requests: 1,
            window: Duration::from_millis(20),
        }]);
        assert!(limiter.check("s").is_ok());
        assert!(limiter.check("s").is_err());
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("s").is_ok());
    }

    #[test]
    fn test_status_and_clear() {
        let limiter = SlidingWindowLimiter::new(vec![WindowLimit::per_minute(5)]);
        limiter.check("s").unwrap();
        limiter.check("s").unwrap();

        let status = limiter.status("s");
        assert_eq!(status[0].current_requests, 2);
        assert_eq!(status[0].remaining, 3);

        let stats = limiter.statistics();
        assert_eq!(stats.active_keys, 1);

        assert!(limiter.clear("s"));
        assert_eq!(limiter.status("s")[0].current_requests, 0);
        limiter.cleanup_old_entries();
        assert_eq!(limiter.statistics().tracked_keys, 0);
    }

    #[test]
    fn test_public_limiter_burst() {
        let limiter = PublicRateLimiter::per_minute(2);
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
        assert!(limiter.check("5.6.7.8"));
    }

    #[test]
    fn test_cleanup_drops_idle_keys() {
        let limiter = SlidingWindowLimiter::new(vec![WindowLimit {
            max_requests: 5,
            window: Duration::from_millis(20),
        }]);
        assert_ok!(limiter.check("idle"));
        std::thread::sleep(Duration::from_millis(40));
        assert_ok!(limiter.check("busy"));

        limiter.cleanup_old_entries();
        let stats = limiter.statistics();
        assert_eq!(stats.tracked_keys, 1);
        assert_eq!(limiter.status("busy")[0].current_requests, 1);
    }

    fn forwarded_request() -> Request {
        let mut request = Request::builder()
            .header("x-forwarded-for", "9.9.9.9, 10.0.0.1")
            .header("x-real-ip", "8.8.8.8")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 5000))));
        request
    }

    #[test]
    fn test_client_key_behind_trusted_proxy() {
        assert_eq!(client_key(&forwarded_request(), true), "9.9.9.9");

        let real_ip_only = Request::builder()
            .header("x-real-ip", " 8.8.8.8 ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&real_ip_only, true), "8.8.8.8");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare, true), "unknown");
    }

    #[test]
    fn test_client_key_ignores_headers_without_trusted_proxy() {
        assert_eq!(client_key(&forwarded_request(), false), "192.0.2.10");

        let spoofed = Request::builder()
            .header("x-forwarded-for", "1.1.1.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&spoofed, false), "unknown");
    }
}
