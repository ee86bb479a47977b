//! Fixed-window rate limiting for API routes.
//!
//! Each client identity gets a window that opens on its first request and
//! lasts `window_secs`. Within a window the first `max_requests` requests
//! pass; the rest are rejected with 429 until the window has elapsed.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::pipeline::{Flow, RequestContext, Stage};

/// Result of counting one request against its client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests seen in the current window, including this one.
    pub count: u32,
    /// When the current window ends.
    pub reset_at: Instant,
}

/// Storage for per-client windows.
///
/// `hit` must be an atomic check-and-increment per key: concurrent hits for
/// the same client may not lose updates.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowHit;

    /// Drop windows that have elapsed. Returns how many were removed.
    fn prune(&self, window: Duration, now: Instant) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    started: Instant,
}

/// In-process store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: DashMap<String, RateLimitWindow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients with a live window.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowHit {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                started: now,
            });

        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count = entry.count.saturating_add(1);

        WindowHit {
            count: entry.count,
            reset_at: entry.started + window,
        }
    }

    fn prune(&self, window: Duration, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        before.saturating_sub(self.windows.len())
    }
}

/// Quota state reported on responses under the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitStatus {
    /// Add `X-RateLimit-*` headers to a response.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from(self.reset_after.as_secs_f64().ceil() as u64),
        );
    }
}

/// Policy plus store.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            store,
            config,
        }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when `path` falls under the limited prefix.
    pub fn applies_to(&self, path: &str) -> bool {
        let prefix = &self.config.path_prefix;
        self.config.enabled && (path.starts_with(prefix.as_str()) || path == prefix.trim_end_matches('/'))
    }

    /// Count a request from `client`, rejecting it when over the limit.
    pub fn check(&self, client: &str) -> Result<RateLimitStatus, ApiError> {
        let now = Instant::now();
        let hit = self.store.hit(client, self.window, now);
        let reset_after = hit.reset_at.saturating_duration_since(now);

        if hit.count > self.config.max_requests {
            tracing::warn!(client = %client, count = hit.count, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Err(ApiError::TooManyRequests {
                client: client.to_string(),
                message: self.config.message.clone(),
                retry_after: reset_after,
            });
        }

        Ok(RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests - hit.count,
            reset_after,
        })
    }

    /// Remove elapsed windows from the store.
    pub fn prune(&self) -> usize {
        self.store.prune(self.window, Instant::now())
    }
}

/// Applies the limiter to requests under the configured prefix.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn apply(&self, mut ctx: RequestContext) -> Flow {
        if !self.limiter.applies_to(ctx.path()) {
            return Flow::Continue(ctx);
        }

        match self.limiter.check(&ctx.client) {
            Ok(status) => {
                ctx.rate_limit = Some(status);
                Flow::Continue(ctx)
            }
            Err(e) => Flow::Fail(e),
        }
    }
}
