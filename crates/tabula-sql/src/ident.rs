//! Identifier validation.
//!
//! Table and column names cannot be bound as parameters, so they are checked
//! against a strict character set before they reach statement text. Names
//! that fail the check are rejected outright instead of being trimmed down to
//! something that might address a different column.

use std::fmt;

/// An identifier that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentError {
    /// The rejected name, verbatim.
    pub name: String,
}

impl fmt::Display for IdentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsafe identifier {:?}: only ASCII letters, digits and '_' are allowed",
            self.name
        )
    }
}

impl std::error::Error for IdentError {}

/// Returns `true` when `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates an identifier, returning it unchanged on success.
///
/// # Errors
///
/// Returns [`IdentError`] when the name does not match
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<&str, IdentError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(IdentError {
            name: name.to_string(),
        })
    }
}
