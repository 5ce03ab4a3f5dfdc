// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mailbox Rate Limiter
//!
//! Per-(client, path) sliding window rate limiting for the virtual mailbox
//! API:
//!
//! - At most `max` admitted requests per key in any trailing `window_ms`
//! - `429 {"error":"rate_limited"}` for everything above that
//! - Inline middleware and forward-auth `/check` sharing one bucket map
//! - Optional sweep of idle buckets

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;

pub use config::Config;
pub use error::ConfigError;
pub use handlers::{router, AppState};
pub use limiter::{Decision, RateLimiter};
