//! Per-User Rate Limiting
//! Mission: Bound request rates per principal with a sliding window

use crate::auth::models::Principal;
use crate::error::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Cap on distinct principals tracked at once. Prevents unbounded
    /// memory growth from a churn of short-lived identities.
    pub max_tracked: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            max_tracked: 10_000,
        }
    }
}

/// Sliding-window rate limiter keyed by authenticated principal.
///
/// Each principal gets a queue of request timestamps. Old timestamps are
/// pruned lazily when that principal next makes a request, plus a periodic
/// cleanup sweep for principals that went quiet.
#[derive(Clone)]
pub struct UserRateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<Uuid, VecDeque<Instant>>>>,
}

impl UserRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one request for the principal, or fail with `RateLimited`
    /// carrying the seconds until the window frees a slot.
    pub fn check_and_record(&self, user_id: Uuid) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut state = self.state.lock();

        // Full sweep before admitting a new key at capacity.
        if state.len() >= self.config.max_tracked && !state.contains_key(&user_id) {
            let window = self.config.window;
            state.retain(|_, timestamps| {
                while timestamps
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= window)
                {
                    timestamps.pop_front();
                }
                !timestamps.is_empty()
            });

            if state.len() >= self.config.max_tracked {
                warn!(
                    tracked = state.len(),
                    "Rate limiter at capacity; throttling new principal"
                );
                return Err(AuthError::RateLimited {
                    retry_after_seconds: self.config.window.as_secs().max(1),
                });
            }
        }

        let timestamps = state.entry(user_id).or_default();
        while timestamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.config.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.config.max_requests as usize {
            // Oldest entry defines when a slot opens up.
            let retry_after = timestamps
                .front()
                .map(|&oldest| {
                    (self.config.window - now.duration_since(oldest)).as_secs().max(1)
                })
                .unwrap_or(1);

            debug!(user_id = %user_id, retry_after, "Rate limit exceeded");
            return Err(AuthError::RateLimited {
                retry_after_seconds: retry_after,
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Drop principals with no requests inside the window. Run periodically
    /// from a background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        let mut state = self.state.lock();
        let before = state.len();

        state.retain(|_, timestamps| {
            while timestamps
                .front()
                .is_some_and(|&t| now.duration_since(t) >= window)
            {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });

        let removed = before - state.len();
        if removed > 0 {
            debug!(removed, remaining = state.len(), "Rate limiter cleanup");
        }
    }

    #[cfg(test)]
    fn tracked_count(&self) -> usize {
        self.state.lock().len()
    }
}

/// Rate-limit layer for protected routes. Runs after auth so the principal
/// is known; requests without one (shouldn't happen on protected routes)
/// pass through unmetered.
pub async fn rate_limit_middleware(
    State(limiter): State<UserRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(principal) = request.extensions().get::<Principal>() {
        limiter.check_and_record(principal.id)?;
    }
    Ok(next.run(request).await)
}
