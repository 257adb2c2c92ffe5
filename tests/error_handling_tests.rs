//! Tests for the error taxonomy and its mapping to exit codes
//!
//! These tests verify that:
//! 1. Library errors carry enough context to act on
//! 2. Conversions from std / serde errors land in the right variant
//! 3. Every error category maps to the documented exit code

use wfcost::error::{ConfigError, Result, WfcostError};
use wfcost::exit_codes::{codes, exit_code_for_error};

#[test]
fn test_config_error_conversion() {
    let config_error = ConfigError::NotFound("/path/to/config".to_string());
    let err: WfcostError = config_error.into();

    assert!(matches!(err, WfcostError::Config(_)));
    assert!(err.to_string().contains("Config file not found"));
    assert_eq!(exit_code_for_error(&err), codes::CONFIG_ERROR);
}

#[test]
fn test_io_error_conversion() {
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let err: WfcostError = io_error.into();

    assert!(matches!(err, WfcostError::Io(_)));
    assert!(err.to_string().contains("I/O error"));
    assert_eq!(exit_code_for_error(&err), codes::SYSTEM_ERROR);
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: WfcostError = json_error.into();
    assert!(matches!(err, WfcostError::Json(_)));
    assert_eq!(exit_code_for_error(&err), codes::USER_ERROR);
}

#[test]
fn test_lookup_error_display() {
    let err = WfcostError::lookup("CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-4", "us-central1");
    let msg = err.to_string();
    assert!(msg.contains("Price lookup failed"));
    assert!(msg.contains("CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-4"));
    assert!(msg.contains("us-central1"));
    assert_eq!(exit_code_for_error(&err), codes::USER_ERROR);
}

#[test]
fn test_parse_error_display() {
    let err = WfcostError::parse("machineType", "custom-4", "expected custom-<cores>-<memoryMB>");
    let msg = err.to_string();
    assert!(msg.contains("machineType"));
    assert!(msg.contains("custom-4"));
    assert_eq!(exit_code_for_error(&err), codes::USER_ERROR);
}

#[test]
fn test_fetch_error_keeps_source() {
    let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
    let err = WfcostError::Fetch {
        target: "price list".to_string(),
        status: None,
        message: "request failed".to_string(),
        source: Some(Box::new(inner)),
    };

    let source = std::error::Error::source(&err).expect("source preserved");
    assert!(source.to_string().contains("connection refused"));
    assert_eq!(exit_code_for_error(&err), codes::SYSTEM_ERROR);
}

#[test]
fn test_retryable_exhausted_maps_to_system_error() {
    let err = WfcostError::Retryable {
        attempt: 3,
        max_attempts: 3,
        reason: "503".to_string(),
        source: None,
    };
    assert!(err.to_string().contains("attempt 3/3"));
    assert_eq!(exit_code_for_error(&err), codes::SYSTEM_ERROR);
}

#[test]
fn test_result_type_alias() {
    fn returns_error() -> Result<()> {
        Err(WfcostError::Validation {
            field: "submission_id".to_string(),
            reason: "expected a UUID".to_string(),
        })
    }

    let err = returns_error().unwrap_err();
    assert!(matches!(err, WfcostError::Validation { .. }));
    assert_eq!(exit_code_for_error(&err), codes::USER_ERROR);
}
