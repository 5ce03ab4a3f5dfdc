// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers and router for the mailbox rate limiter service.
//!
//! The limiter runs in two modes that share one set of buckets:
//!
//! 1. **Inline**: `/api/*` routes sit behind the [`rate_limit`] middleware.
//! 2. **Forward-auth**: a reverse proxy posts the caller and path to
//!    `/check` and acts on the answer.

use crate::config::Config;
use crate::limiter::{bucket_key, normalize_path, Decision, RateLimiter};
use crate::metrics::Metrics;
use crate::middleware::{rate_limit, retry_after_secs};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> prometheus::Result<Self> {
        Ok(Self {
            limiter: RateLimiter::new(config.rate_limit.clone()),
            metrics: Metrics::new()?,
            config,
        })
    }

    /// Drop idle buckets and refresh the key gauge.
    pub fn sweep(&self, now: u64) -> usize {
        let removed = self.limiter.sweep(now);
        self.metrics.set_tracked_keys(self.limiter.tracked_keys());
        removed
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &'static str) -> Self {
        Self {
            error,
            message: None,
        }
    }

    pub fn with_message(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: Some(message.into()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Forward-auth check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Caller address as seen by the proxy
    pub client: String,
    /// Request path or absolute URL; query and fragment are ignored
    #[serde(default = "default_check_path")]
    pub path: String,
}

fn default_check_path() -> String {
    "/".to_string()
}

/// Forward-auth check response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Body returned by the rate limited `/api` routes once admitted.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub path: String,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api", any(accepted))
        .route("/api/*rest", any(accepted))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .merge(api);

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Decide on a request on behalf of a reverse proxy.
///
/// Always answers 200 for a well-formed request so the proxy can read the
/// body; the proxy turns `allowed: false` into its own 429.
pub async fn check(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed check request");
            return (
                rejection.status(),
                Json(ErrorResponse::with_message(
                    "invalid_request",
                    rejection.body_text(),
                )),
            )
                .into_response();
        }
    };

    let client = req.client.trim();
    if client.is_empty() {
        warn!("Check request without client address");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message(
                "invalid_request",
                "client must not be empty",
            )),
        )
            .into_response();
    }

    let path = normalize_path(&req.path);
    let decision = state.limiter.check(&bucket_key(client, &path));
    state.metrics.observe(&decision, state.limiter.tracked_keys());
    debug!(%client, %path, ?decision, "Processed rate limit check");

    let body = match decision {
        Decision::Admitted { remaining, .. } => CheckResponse {
            allowed: true,
            remaining: Some(remaining),
            retry_after_secs: None,
        },
        Decision::Rejected { retry_after_ms } => CheckResponse {
            allowed: false,
            remaining: None,
            retry_after_secs: Some(retry_after_secs(retry_after_ms)),
        },
    };
    Json(body).into_response()
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error")),
            )
                .into_response()
        }
    }
}

/// Terminal handler for admitted `/api` requests.
pub async fn accepted(uri: Uri) -> Json<AcceptedResponse> {
    Json(AcceptedResponse {
        status: "accepted",
        path: uri.path().to_string(),
    })
}
