// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request-path rate limiting.
//!
//! Runs ahead of the protected routes: the caller's address and the request
//! path form the bucket key, admitted requests continue to the inner
//! service, and rejected ones are answered with `429 {"error":"rate_limited"}`.

use crate::handlers::{AppState, ErrorResponse};
use crate::limiter::{bucket_key, normalize_path, Decision};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limit middleware, installed with `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_address(
        request.headers(),
        peer,
        state.config.client.trust_forwarded_for,
    );
    let path = normalize_path(request.uri().path());
    let key = bucket_key(&client, &path);

    let decision = state.limiter.check(&key);
    state.metrics.observe(&decision, state.limiter.tracked_keys());

    match decision {
        Decision::Admitted { remaining, .. } => {
            debug!(%client, %path, remaining, "Request admitted");
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(state.limiter.config().max));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Rejected { retry_after_ms } => {
            let retry_after_secs = retry_after_secs(retry_after_ms);
            debug!(%client, %path, retry_after_secs, "Request rate limited");
            rate_limited_response(retry_after_secs)
        }
    }
}

/// The `429` answer for a rejected request.
pub fn rate_limited_response(retry_after_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, HeaderValue::from(retry_after_secs))],
        Json(ErrorResponse::new("rate_limited")),
    )
        .into_response()
}

/// Whole seconds for a `Retry-After` header, rounded up and never zero.
pub fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1000).max(1)
}

/// Identify the caller.
///
/// With `trust_forwarded_for`, the left-most `X-Forwarded-For` entry wins;
/// otherwise the peer address is used, and `unknown` when neither exists.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
