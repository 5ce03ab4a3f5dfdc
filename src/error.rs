// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the mailbox rate limiter.

use thiserror::Error;

/// Configuration errors, reported with the offending variable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} is not a valid {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ConfigError>;
