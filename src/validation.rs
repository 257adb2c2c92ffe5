//! Input validation utilities
//!
//! Checks workflow identifiers before they are interpolated into API URLs.

use crate::error::{Result, WfcostError};
use uuid::Uuid;

/// Validate a billing-project namespace or workspace name
///
/// Terra names are letters, digits, hyphens and underscores.
pub fn validate_workspace_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(WfcostError::Validation {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }

    if value.len() > 254 {
        return Err(WfcostError::Validation {
            field: field.to_string(),
            reason: format!("must be <= 254 characters (len: {})", value.len()),
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(WfcostError::Validation {
            field: field.to_string(),
            reason: format!(
                "must contain only letters, digits, hyphens and underscores, got: {}",
                value
            ),
        });
    }

    Ok(())
}

/// Validate a submission or workflow id (UUID)
pub fn validate_uuid(field: &str, value: &str) -> Result<()> {
    Uuid::parse_str(value).map_err(|e| WfcostError::Validation {
        field: field.to_string(),
        reason: format!("expected a UUID, got: {} ({})", value, e),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_workspace_component() {
        assert!(validate_workspace_component("namespace", "clara-terra").is_ok());
        assert!(validate_workspace_component("workspace", "Clara_Parabricks-2").is_ok());
        assert!(validate_workspace_component("workspace", "").is_err());
        assert!(validate_workspace_component("workspace", "a/b").is_err());
        assert!(validate_workspace_component("workspace", "has space").is_err());
        assert!(validate_workspace_component("workspace", &"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("submission_id", "6d1f3a6c-3f1e-4d5e-9c8a-2b7e1f0a9d41").is_ok());
        let err = validate_uuid("workflow_id", "not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("workflow_id"));
    }
}
