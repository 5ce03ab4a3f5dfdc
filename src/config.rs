// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the mailbox rate limiter.
//!
//! Every field has a default, so an empty environment yields a working
//! service: 60 requests per 60 second window for each client and path.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const RESERVED_PATHS: [&str; 4] = ["/", "/health", "/healthz", "/check"];

/// Configuration for the rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Client identification
    #[serde(default)]
    pub client: ClientConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Sliding window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum admitted requests inside the window (default: 60)
    #[serde(default = "default_max")]
    pub max: u32,

    /// Keep rejected arrivals in the window, so a client that keeps
    /// retrying stays blocked (default: false)
    #[serde(default)]
    pub count_rejected: bool,

    /// Interval of the stale bucket sweep in seconds, 0 disables it (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// How the caller's identity is derived from a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Use the left-most `X-Forwarded-For` entry when present (default: false).
    /// Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max() -> u32 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            client: ClientConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max: default_max(),
            count_rejected: false,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Build a config with the given window and maximum, other fields default.
    ///
    /// Both must be at least 1; [`crate::limiter::RateLimiter::new`] asserts
    /// this in debug builds and [`Config::validate`] rejects it at load time.
    pub fn new(window_ms: u64, max: u32) -> Self {
        Self {
            window_ms,
            max,
            ..Default::default()
        }
    }

    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Get the sweep interval, `None` when sweeping is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// Recognised variables: `BIND_ADDR`, `RATE_LIMIT_WINDOW_MS`,
    /// `RATE_LIMIT_MAX`, `RATE_LIMIT_COUNT_REJECTED`, `RATE_LIMIT_SWEEP_SECS`,
    /// `TRUST_FORWARDED_FOR`, `METRICS_ENABLED`, `METRICS_PATH`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            rate_limit: RateLimitConfig {
                window_ms: parse_var(&lookup, "RATE_LIMIT_WINDOW_MS", "integer")?
                    .unwrap_or(defaults.rate_limit.window_ms),
                max: parse_var(&lookup, "RATE_LIMIT_MAX", "integer")?
                    .unwrap_or(defaults.rate_limit.max),
                count_rejected: parse_bool(&lookup, "RATE_LIMIT_COUNT_REJECTED")?
                    .unwrap_or(defaults.rate_limit.count_rejected),
                sweep_interval_secs: parse_var(&lookup, "RATE_LIMIT_SWEEP_SECS", "integer")?
                    .unwrap_or(defaults.rate_limit.sweep_interval_secs),
            },
            client: ClientConfig {
                trust_forwarded_for: parse_bool(&lookup, "TRUST_FORWARDED_FOR")?
                    .unwrap_or(defaults.client.trust_forwarded_for),
            },
            metrics: MetricsConfig {
                enabled: parse_bool(&lookup, "METRICS_ENABLED")?
                    .unwrap_or(defaults.metrics.enabled),
                path: lookup("METRICS_PATH").unwrap_or(defaults.metrics.path),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                var: "BIND_ADDR",
                value: self.bind_addr.clone(),
                expected: "socket address",
            });
        }
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::Invalid("rate limit window must be at least 1ms"));
        }
        if self.rate_limit.max == 0 {
            return Err(ConfigError::Invalid("rate limit max must be at least 1"));
        }
        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::Invalid("metrics path must start with '/'"));
        }
        if RESERVED_PATHS.contains(&self.metrics.path.as_str())
            || self.metrics.path.starts_with("/api")
        {
            return Err(ConfigError::Invalid("metrics path collides with a service route"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, expected: &'static str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var,
                value,
                expected,
            }),
    }
}

fn parse_bool<F>(lookup: &F, var: &'static str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            var,
            value,
            expected: "boolean",
        }),
    }
}
