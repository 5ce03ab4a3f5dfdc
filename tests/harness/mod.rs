// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for replaying traffic against the rate limiter.
//!
//! Traffic runs on a synthetic millisecond clock, so windows of any length
//! can be exercised without sleeping.

pub mod generators;
pub mod metrics;
