// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for rate limit decisions.

use crate::limiter::Decision;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Metrics owned by one service instance.
///
/// Uses its own registry rather than the process-wide default, so several
/// instances (tests, embedded routers) never collide on registration.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    admitted: IntCounter,
    rejected: IntCounter,
    tracked_keys: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let admitted = IntCounter::new(
            "rate_limiter_admitted_total",
            "Requests admitted by the rate limiter",
        )?;
        let rejected = IntCounter::new(
            "rate_limiter_rejected_total",
            "Requests rejected by the rate limiter",
        )?;
        let tracked_keys = IntGauge::new(
            "rate_limiter_tracked_keys",
            "Client and path keys currently holding a bucket",
        )?;

        registry.register(Box::new(admitted.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(tracked_keys.clone()))?;

        Ok(Self {
            registry,
            admitted,
            rejected,
            tracked_keys,
        })
    }

    /// Count a decision and refresh the key gauge.
    pub fn observe(&self, decision: &Decision, tracked_keys: usize) {
        match decision {
            Decision::Admitted { .. } => self.admitted.inc(),
            Decision::Rejected { .. } => self.rejected.inc(),
        }
        self.set_tracked_keys(tracked_keys);
    }

    pub fn set_tracked_keys(&self, tracked_keys: usize) {
        self.tracked_keys
            .set(i64::try_from(tracked_keys).unwrap_or(i64::MAX));
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.get()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
