//! Error types for wfcost
//!
//! This module defines the error handling strategy for wfcost. There are two
//! error types: `WfcostError` (main error enum) and `ConfigError` (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Every failure aborts the whole estimate. There is no best-effort total: a
//! number that looks like a real cost but silently skipped a task is worse than
//! a visible failure. The binary maps errors to exit codes in `src/exit_codes.rs`.
//!
//! ## Retry Awareness
//!
//! Errors implement `IsRetryable` to indicate whether a fetch should be retried.
//! The `RetryPolicy` in `src/retry.rs` uses this to determine retry behavior.
//! Only transient `Fetch` failures (no HTTP status, 5xx, 429) and `Io` are retryable.
//! The cost engine itself never retries.
//!
//! ## When to Use Which Error
//!
//! - `Lookup`: a price key or region is absent from the pricing table
//!   - Signals a descriptor/table mismatch, not retryable
//!
//! - `Parse`: a resource descriptor does not match its grammar
//!   - Machine types, disk specs, timestamps, GPU counts
//!
//! - `Fetch`: the metadata service or the price list could not be retrieved
//!
//! - `Validation`: CLI identifiers rejected before any network call

use thiserror::Error;

/// Main error type for wfcost
#[derive(Error, Debug)]
pub enum WfcostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Price lookup failed: no price for {key} in region {region}")]
    Lookup { key: String, region: String },

    #[error("Parse error: {field} - {reason} (got: {value:?})")]
    Parse {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Fetch error: {target} - {message}")]
    Fetch {
        target: String,
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Retryable error (attempt {attempt}/{max_attempts}): {reason}")]
    Retryable {
        attempt: u32,
        max_attempts: u32,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WfcostError {
    pub fn lookup(key: impl Into<String>, region: impl Into<String>) -> Self {
        WfcostError::Lookup {
            key: key.into(),
            region: region.into(),
        }
    }

    pub fn parse(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        WfcostError::Parse {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WfcostError>;

/// Trait for determining if an error is retryable
///
/// Used by `RetryPolicy` implementations to determine whether an error
/// should trigger a retry attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for WfcostError {
    fn is_retryable(&self) -> bool {
        match self {
            WfcostError::Fetch { status, .. } => match status {
                None => true,
                Some(code) => *code >= 500 || *code == 429,
            },
            WfcostError::Io(_) => true,
            _ => false,
        }
    }
}
