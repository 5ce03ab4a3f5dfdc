// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding window rate limiter.
//!
//! Each key (client address followed by request path) owns a bucket of
//! recent arrival timestamps in milliseconds since the Unix epoch. Every
//! admission prunes the bucket to the trailing window, appends the new
//! arrival, and rejects it once the bucket holds more than `max` entries.
//!
//! Pruning is lazy. A bucket that stops receiving traffic keeps its stale
//! timestamps until it is next touched or until [`RateLimiter::sweep`] runs.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, trace};
use url::Url;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request is admitted
    Admitted {
        /// Requests still available in the current window
        remaining: u32,
        /// Milliseconds until the oldest arrival leaves the window
        reset_in_ms: u64,
    },
    /// Request is rejected
    Rejected {
        /// Milliseconds until a retry can be admitted
        retry_after_ms: u64,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Compose a bucket key from the caller's address and the request path.
pub fn bucket_key(client: &str, path: &str) -> String {
    let mut key = String::with_capacity(client.len() + path.len());
    key.push_str(client);
    key.push_str(path);
    key
}

/// Reduce a path or absolute URL to the path used in bucket keys.
///
/// Query and fragment are dropped, dot segments are resolved and the result
/// is percent-encoded the same way whatever form the caller sent, so
/// `/api/./mailbox` and `/api/mailbox` share a bucket.
pub fn normalize_path(raw: &str) -> String {
    let parsed = Url::parse(raw).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(raw))
    });
    match parsed {
        Ok(url) => url.path().to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Thread-safe per-key sliding window limiter.
///
/// The map is sharded; an admission holds its key's shard lock for the
/// whole prune, append and check sequence.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, VecDeque<u64>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    ///
    /// `config.window_ms` and `config.max` must both be at least 1, as
    /// enforced by [`crate::config::Config::validate`]. With `max == 0`
    /// every arrival would be rejected.
    pub fn new(config: RateLimitConfig) -> Self {
        debug_assert!(config.window_ms > 0, "rate limit window must be at least 1ms");
        debug_assert!(config.max > 0, "rate limit max must be at least 1");
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an arrival for `key` at `now` and decide whether to admit it.
    pub fn admit(&self, key: &str, now: u64) -> Decision {
        let window = self.config.window_ms;
        let max = self.config.max as usize;

        let mut bucket = self.buckets.entry(key.to_string()).or_default();
        prune(&mut bucket, now, window);
        bucket.push_back(now);

        if bucket.len() > max {
            if !self.config.count_rejected {
                bucket.pop_back();
            }
            let retry_after_ms = time_until_admissible(&bucket, now, window, max);
            trace!(key, len = bucket.len(), retry_after_ms, "Arrival rejected");
            return Decision::Rejected { retry_after_ms };
        }

        let reset_in_ms = bucket
            .front()
            .map_or(window, |oldest| expires_in(*oldest, now, window));
        Decision::Admitted {
            remaining: (max - bucket.len()) as u32,
            reset_in_ms,
        }
    }

    /// Admit an arrival for `key` at the current wall-clock time.
    pub fn check(&self, key: &str) -> Decision {
        self.admit(key, now_ms())
    }

    /// Prune every bucket and drop the ones left empty.
    ///
    /// Returns the number of keys removed. Only buckets with no arrival
    /// inside the window are dropped, so later decisions are unaffected.
    pub fn sweep(&self, now: u64) -> usize {
        let window = self.config.window_ms;
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            prune(bucket, now, window);
            !bucket.is_empty()
        });
        let removed = before.saturating_sub(self.buckets.len());
        debug!(removed, remaining = self.buckets.len(), "Swept rate limit buckets");
        removed
    }

    /// Number of keys currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Drop arrivals that are a full window or more behind `now`.
fn prune(bucket: &mut VecDeque<u64>, now: u64, window: u64) {
    while let Some(&oldest) = bucket.front() {
        if now.saturating_sub(oldest) >= window {
            bucket.pop_front();
        } else {
            break;
        }
    }
}

fn expires_in(arrival: u64, now: u64, window: u64) -> u64 {
    arrival.saturating_add(window).saturating_sub(now)
}

/// Time until enough retained arrivals expire that one more would fit
/// under `max`. Expects `bucket.len() >= max`.
fn time_until_admissible(bucket: &VecDeque<u64>, now: u64, window: u64, max: usize) -> u64 {
    // Everything up to and including index len - max has to leave the window.
    bucket
        .get(bucket.len() - max)
        .map_or(0, |arrival| expires_in(*arrival, now, window))
}
