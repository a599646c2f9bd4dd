//! Rate limiters (C2, §4.2): token bucket and sliding window, both behind
//! the same `Allow`/`stats` interface, plus an endpoint overlay that picks
//! a limiter per `(path, method)` glob pattern.
//!
//! Grounded on the teacher's `lib/integration/src/rate_limit.rs`
//! (per-key `HashMap` state behind a lock, `RateLimitConfig`/window-reset
//! shape) generalized from a single fixed-window algorithm to the spec's
//! token-bucket and sliding-window variants.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration as StdDuration;

/// Shared configuration for either limiter variant.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: StdDuration,
    /// Token-bucket only: burst capacity. Ignored by the sliding-window
    /// variant.
    pub burst_size: u32,
    /// Token-bucket only: how often the bucket refills by one unit toward
    /// `rate`. Ignored by the sliding-window variant.
    pub refill_interval: StdDuration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn per_window(requests_per_window: u32, window: StdDuration) -> Self {
        Self {
            requests_per_window,
            window,
            burst_size: requests_per_window,
            refill_interval: window,
        }
    }
}

/// Current usage for a client key (§4.2, surfaced as `X-RateLimit-*`
/// response headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,
    /// When this client key's window next resets.
    pub reset: DateTime<Utc>,
}

fn chrono_duration(d: StdDuration) -> Duration {
    Duration::from_std(d).unwrap_or(Duration::zero())
}

struct TokenBucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
    window_count: u32,
    window_start: DateTime<Utc>,
    last_touched: DateTime<Utc>,
}

/// Token-bucket limiter: `window_count` enforces the per-window request
/// cap (§4.2 step 3), `tokens` independently enforces burst smoothing
/// (step 4) — a request is denied if either is exhausted.
pub struct TokenBucketLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, TokenBucketState>>,
}

impl TokenBucketLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn allow(&self, client_key: &str) -> bool {
        let now = Utc::now();
        let window = chrono_duration(self.config.window);
        let mut state = self.state.lock();
        let entry = state.entry(client_key.to_string()).or_insert(TokenBucketState {
            tokens: f64::from(self.config.burst_size),
            last_refill: now,
            window_count: 0,
            window_start: now,
            last_touched: now,
        });
        entry.last_touched = now;

        if now - entry.window_start >= window {
            entry.window_count = 0;
            entry.window_start = now;
            entry.tokens = f64::from(self.config.burst_size);
            entry.last_refill = now;
        } else {
            let elapsed = (now - entry.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
            let rate = f64::from(self.config.requests_per_window)
                / self.config.window.as_secs_f64().max(1.0);
            entry.tokens = (entry.tokens + elapsed * rate).min(f64::from(self.config.burst_size));
            entry.last_refill = now;
        }

        if entry.window_count >= self.config.requests_per_window {
            return false;
        }
        if entry.tokens <= 0.0 {
            return false;
        }

        entry.tokens -= 1.0;
        entry.window_count += 1;
        true
    }

    #[must_use]
    pub fn stats(&self, client_key: &str) -> Stats {
        let now = Utc::now();
        let window = chrono_duration(self.config.window);
        let state = self.state.lock();
        match state.get(client_key) {
            Some(entry) => Stats {
                used: entry.window_count,
                remaining: self.config.requests_per_window.saturating_sub(entry.window_count),
                limit: self.config.requests_per_window,
                reset: entry.window_start + window,
            },
            None => Stats {
                used: 0,
                remaining: self.config.requests_per_window,
                limit: self.config.requests_per_window,
                reset: now + window,
            },
        }
    }

    /// Drops client state untouched for `2 × window` (§4.2 janitor).
    pub fn sweep(&self) {
        let now = Utc::now();
        let stale_after = chrono_duration(self.config.window) * 2;
        self.state.lock().retain(|_, entry| now - entry.last_touched < stale_after);
    }
}

/// Sliding-window limiter: keeps the ordered firing instants within the
/// last `window` per client key.
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn allow(&self, client_key: &str) -> bool {
        let now = Utc::now();
        let window = chrono_duration(self.config.window);
        let mut state = self.state.lock();
        let entry = state.entry(client_key.to_string()).or_default();
        entry.retain(|instant| now - *instant < window);

        if entry.len() as u32 >= self.config.requests_per_window {
            return false;
        }
        entry.push(now);
        true
    }

    #[must_use]
    pub fn stats(&self, client_key: &str) -> Stats {
        let now = Utc::now();
        let window = chrono_duration(self.config.window);
        let state = self.state.lock();
        let live: Vec<&DateTime<Utc>> = state
            .get(client_key)
            .map(|instants| instants.iter().filter(|i| now - **i < window).collect())
            .unwrap_or_default();
        let used = live.len() as u32;
        let reset = live.iter().min().map(|oldest| **oldest + window).unwrap_or(now + window);
        Stats {
            used,
            remaining: self.config.requests_per_window.saturating_sub(used),
            limit: self.config.requests_per_window,
            reset,
        }
    }

    /// Drops client state whose instant list is empty after expiry
    /// (§4.2 janitor).
    pub fn sweep(&self) {
        let now = Utc::now();
        let window = chrono_duration(self.config.window);
        let mut state = self.state.lock();
        state.retain(|_, instants| {
            instants.retain(|i| now - *i < window);
            !instants.is_empty()
        });
    }
}

/// Either limiter variant, or unconditional allow when disabled (§4.2).
pub enum RateLimiter {
    TokenBucket(TokenBucketLimiter),
    SlidingWindow(SlidingWindowLimiter),
    Disabled,
}

impl RateLimiter {
    #[must_use]
    pub fn allow(&self, client_key: &str) -> bool {
        match self {
            Self::TokenBucket(limiter) => limiter.allow(client_key),
            Self::SlidingWindow(limiter) => limiter.allow(client_key),
            Self::Disabled => true,
        }
    }

    #[must_use]
    pub fn stats(&self, client_key: &str) -> Stats {
        match self {
            Self::TokenBucket(limiter) => limiter.stats(client_key),
            Self::SlidingWindow(limiter) => limiter.stats(client_key),
            Self::Disabled => Stats {
                used: 0,
                remaining: u32::MAX,
                limit: u32::MAX,
                reset: Utc::now(),
            },
        }
    }

    pub fn sweep(&self) {
        match self {
            Self::TokenBucket(limiter) => limiter.sweep(),
            Self::SlidingWindow(limiter) => limiter.sweep(),
            Self::Disabled => {}
        }
    }
}

/// `(path, method) → RateLimitConfig` overlay (§4.2 endpoint overlay):
/// builds one inner limiter per matching pattern, falling back to a
/// default config when nothing matches.
pub struct EndpointRateLimiter {
    default_config: RateLimitConfig,
    patterns: Vec<(String, String, RateLimitConfig)>,
    limiters: Mutex<HashMap<(String, String), RateLimiter>>,
    variant: LimiterVariant,
}

#[derive(Clone, Copy)]
enum LimiterVariant {
    TokenBucket,
    SlidingWindow,
    Disabled,
}

impl EndpointRateLimiter {
    #[must_use]
    pub fn token_bucket(default_config: RateLimitConfig) -> Self {
        Self {
            default_config,
            patterns: Vec::new(),
            limiters: Mutex::new(HashMap::new()),
            variant: LimiterVariant::TokenBucket,
        }
    }

    #[must_use]
    pub fn sliding_window(default_config: RateLimitConfig) -> Self {
        Self {
            default_config,
            patterns: Vec::new(),
            limiters: Mutex::new(HashMap::new()),
            variant: LimiterVariant::SlidingWindow,
        }
    }

    /// Every endpoint allows unconditionally (§4.2 "when disabled, `Allow`
    /// is constant-true"). `with_override` still composes but has no
    /// observable effect, since every resolved config builds a
    /// [`RateLimiter::Disabled`].
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            default_config: RateLimitConfig::per_window(u32::MAX, StdDuration::from_secs(1)),
            patterns: Vec::new(),
            limiters: Mutex::new(HashMap::new()),
            variant: LimiterVariant::Disabled,
        }
    }

    /// Registers `(path_pattern, method)` with a non-default config.
    /// `path_pattern` segments may be `*` to match any single segment.
    pub fn with_override(
        mut self,
        path_pattern: impl Into<String>,
        method: impl Into<String>,
        config: RateLimitConfig,
    ) -> Self {
        self.patterns.push((path_pattern.into(), method.into(), config));
        self
    }

    fn resolve_config(&self, path: &str, method: &str) -> RateLimitConfig {
        self.patterns
            .iter()
            .find(|(pattern, m, _)| m.eq_ignore_ascii_case(method) && jobgrid_auth::match_path(pattern, path))
            .map_or(self.default_config, |(_, _, config)| *config)
    }

    fn build_limiter(&self, config: RateLimitConfig) -> RateLimiter {
        match self.variant {
            LimiterVariant::TokenBucket => RateLimiter::TokenBucket(TokenBucketLimiter::new(config)),
            LimiterVariant::SlidingWindow => RateLimiter::SlidingWindow(SlidingWindowLimiter::new(config)),
            LimiterVariant::Disabled => RateLimiter::Disabled,
        }
    }

    #[must_use]
    pub fn allow(&self, path: &str, method: &str, client_key: &str) -> bool {
        let key = (path.to_string(), method.to_uppercase());
        let mut limiters = self.limiters.lock();
        if !limiters.contains_key(&key) {
            let config = self.resolve_config(path, method);
            limiters.insert(key.clone(), self.build_limiter(config));
        }
        limiters.get(&key).expect("just inserted").allow(client_key)
    }

    #[must_use]
    pub fn stats(&self, path: &str, method: &str, client_key: &str) -> Stats {
        let key = (path.to_string(), method.to_uppercase());
        let limiters = self.limiters.lock();
        limiters.get(&key).map(|limiter| limiter.stats(client_key)).unwrap_or_else(|| {
            let config = self.resolve_config(path, method);
            Stats {
                used: 0,
                remaining: config.requests_per_window,
                limit: config.requests_per_window,
                reset: Utc::now() + chrono_duration(config.window),
            }
        })
    }

    pub fn sweep(&self) {
        for limiter in self.limiters.lock().values() {
            limiter.sweep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_window() -> RateLimitConfig {
        RateLimitConfig::per_window(3, StdDuration::from_secs(60))
    }

    #[test]
    fn token_bucket_denies_after_window_cap() {
        let limiter = TokenBucketLimiter::new(small_window());
        assert!(limiter.allow("k1"));
        assert!(limiter.allow("k1"));
        assert!(limiter.allow("k1"));
        assert!(!limiter.allow("k1"));
    }

    #[test]
    fn token_bucket_stats_reports_remaining() {
        let limiter = TokenBucketLimiter::new(small_window());
        limiter.allow("k1");
        let stats = limiter.stats("k1");
        assert_eq!(stats.used, 1);
        assert_eq!(stats.remaining, 2);
    }

    #[test]
    fn sliding_window_denies_after_cap_then_allows_distinct_keys() {
        let limiter = SlidingWindowLimiter::new(small_window());
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::Disabled;
        for _ in 0..100 {
            assert!(limiter.allow("any"));
        }
    }

    #[test]
    fn endpoint_overlay_disabled_always_allows() {
        let overlay = EndpointRateLimiter::disabled();
        for _ in 0..10 {
            assert!(overlay.allow("/api/v1/tasks", "POST", "client"));
        }
    }

    #[test]
    fn endpoint_overlay_uses_override_for_matching_pattern() {
        let overlay = EndpointRateLimiter::sliding_window(RateLimitConfig::per_window(
            100,
            StdDuration::from_secs(60),
        ))
        .with_override("/api/v1/tasks/*/trigger", "POST", small_window());

        for _ in 0..3 {
            assert!(overlay.allow("/api/v1/tasks/t1/trigger", "POST", "client"));
        }
        assert!(!overlay.allow("/api/v1/tasks/t1/trigger", "POST", "client"));
        // A different path/method falls back to the generous default.
        assert!(overlay.allow("/api/v1/tasks", "GET", "client"));
    }

    #[test]
    fn janitor_sweep_drops_stale_token_bucket_entries() {
        let limiter = TokenBucketLimiter::new(RateLimitConfig::per_window(
            5,
            StdDuration::from_millis(1),
        ));
        limiter.allow("k1");
        std::thread::sleep(StdDuration::from_millis(5));
        limiter.sweep();
        assert_eq!(limiter.stats("k1").used, 0);
    }
}
