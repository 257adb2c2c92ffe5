//! Exit code standardization for wfcost
//!
//! Provides consistent exit codes for different error types so scripts can
//! tell a bad input apart from an unreachable service.
//!
//! ## Exit Code Convention
//!
//! - `0` = Success
//! - `1` = User/data error (invalid identifiers, malformed document, unparsable descriptor, missing price)
//! - `2` = System error (network failure, service error, I/O)
//! - `3` = Configuration error (invalid or unparsable config file)

use crate::error::WfcostError;

/// Standard exit codes for wfcost
pub mod codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// User or data error (validation, parse, price lookup)
    pub const USER_ERROR: i32 = 1;
    /// System error (fetch failure, I/O)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a WfcostError to an appropriate exit code
pub fn exit_code_for_error(error: &WfcostError) -> i32 {
    use WfcostError::*;
    match error {
        Config(_) => codes::CONFIG_ERROR,

        Validation { .. } => codes::USER_ERROR,
        Parse { .. } => codes::USER_ERROR,
        Lookup { .. } => codes::USER_ERROR,
        // Malformed metadata or price-list document
        Json(_) => codes::USER_ERROR,

        Fetch { .. } => codes::SYSTEM_ERROR,
        Retryable { .. } => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit with appropriate code based on error type
pub fn exit_with_code(error: &WfcostError) -> ! {
    let code = exit_code_for_error(error);
    std::process::exit(code);
}
