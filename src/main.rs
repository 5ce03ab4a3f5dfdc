// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mailbox Rate Limiter Service
//!
//! Sliding window rate limiting in front of the virtual mailbox API.
//!
//! ## Usage
//!
//! 1. **Inline**: requests to `/api/*` pass through the limiter and are
//!    answered with `429 {"error":"rate_limited"}` once a client exceeds
//!    its budget for that path.
//!
//! 2. **Forward-auth**: a reverse proxy calls `POST /check` with the
//!    client address and path before forwarding.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT_WINDOW_MS`: Sliding window length (default: 60000)
//! - `RATE_LIMIT_MAX`: Requests admitted per window (default: 60)
//! - `RATE_LIMIT_COUNT_REJECTED`: Count rejected requests too (default: false)
//! - `RATE_LIMIT_SWEEP_SECS`: Idle bucket sweep interval, 0 disables (default: 60)
//! - `TRUST_FORWARDED_FOR`: Identify clients by `X-Forwarded-For` (default: false)
//! - `METRICS_ENABLED` / `METRICS_PATH`: Prometheus endpoint (default: true, /metrics)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mailbox_rate_limiter::{config::Config, handlers::router, limiter::now_ms, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        window_ms = config.rate_limit.window_ms,
        max = config.rate_limit.max,
        count_rejected = config.rate_limit.count_rejected,
        sweep_interval_secs = config.rate_limit.sweep_interval_secs,
        trust_forwarded_for = config.client.trust_forwarded_for,
        metrics_enabled = config.metrics.enabled,
        "Starting mailbox rate limiter"
    );

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(config)?);

    if let Some(period) = state.config.rate_limit.sweep_interval() {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sweep_state.sweep(now_ms());
            }
        });
    }

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
