//! Naming validation for owners and applications.
//!
//! Both names appear in queue target strings, URLs, and ephemeral
//! resource names, so they are restricted to a conservative charset.

use crate::error::CoreError;

/// Maximum length of an owner or application name.
const MAX_NAME_LEN: usize = 64;

/// Validate an owner or application name.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_NAME_LEN` characters.
/// - Must contain only alphanumeric, hyphen, or underscore characters.
/// - Must start with an alphanumeric character.
pub fn validate_name(kind: &str, name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(format!(
            "{kind} name must not be empty"
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "{kind} name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "{kind} name may only contain alphanumeric, hyphen, or underscore characters"
        )));
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::Validation(format!(
            "{kind} name must start with an alphanumeric character"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
