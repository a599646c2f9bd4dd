//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables, exactly as the teacher's own `ServerConfig`
//! does (`__`-separated env vars, `try_deserialize` into one struct tree).

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Top-level server configuration (§6 "Configuration surface").
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// JWT issuance/verification settings.
    pub jwt: JwtConfig,

    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Which scheduler adapter is active at startup.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// JWT configuration (§6): `{secret, issuer, access_ttl, refresh_ttl}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret. No default — startup fails without one.
    pub secret: String,

    /// Token issuer claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime, in seconds.
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime, in seconds.
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

fn default_issuer() -> String {
    "jobgrid".to_string()
}

fn default_access_ttl_secs() -> u64 {
    86_400
}

fn default_refresh_ttl_secs() -> u64 {
    604_800
}

impl JwtConfig {
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

/// Rate limit configuration (§6): `{enabled, requests_per_ip, burst_size,
/// window, cleanup_period}` plus optional per-endpoint overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_requests_per_ip")]
    pub requests_per_ip: u32,

    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_cleanup_period_secs")]
    pub cleanup_period_secs: u64,

    /// `(path_pattern, method) → requests_per_window` overrides, applied
    /// on top of the default window/burst shape.
    #[serde(default)]
    pub endpoint_overrides: HashMap<String, u32>,
}

fn default_true() -> bool {
    true
}

fn default_requests_per_ip() -> u32 {
    120
}

fn default_burst_size() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    60
}

fn default_cleanup_period_secs() -> u64 {
    300
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_ip: default_requests_per_ip(),
            burst_size: default_burst_size(),
            window_secs: default_window_secs(),
            cleanup_period_secs: default_cleanup_period_secs(),
            endpoint_overrides: HashMap::new(),
        }
    }
}

impl RateLimitSettings {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_period_secs)
    }
}

/// Which scheduler adapter is current at startup (§6): `{type, endpoint?,
/// properties}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_scheduler_type")]
    pub r#type: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_scheduler_type() -> String {
    "builtin".to_string()
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            r#type: default_scheduler_type(),
            endpoint: None,
            properties: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration (the JWT secret) is
    /// missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_settings_have_correct_defaults() {
        let settings = RateLimitSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.requests_per_ip, 120);
        assert_eq!(settings.window_secs, 60);
    }

    #[test]
    fn scheduler_settings_default_to_builtin() {
        assert_eq!(SchedulerSettings::default().r#type, "builtin");
    }
}
