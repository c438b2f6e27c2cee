//! Explicit pre-save validation for assignments.
//!
//! Validation is a pure function invoked before every persistence call,
//! never an implicit hook: the write path loads the split, calls
//! [`validate_assignment`], and rejects the write when the returned list is
//! non-empty. Membership in the split's variant set is re-checked on every
//! save because a split's registry can change after an assignment is made.

use crate::model::Split;
use serde::Serialize;
use std::fmt;

/// A field-level validation error surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The offending field, e.g. `variant`.
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    /// Build an error for `field` with a human-facing message.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate assignment fields against the (possibly absent) split.
///
/// Returns one entry per failed rule, empty when the write may proceed:
///
/// - `visitor` must be present (non-blank id)
/// - `split` must be associated
/// - `variant` must be non-blank
/// - `variant` must be in the split's current variant set; skipped when no
///   split is associated, since the missing-split error already blocks the
///   write
#[must_use]
pub fn validate_assignment(
    visitor_id: &str,
    variant: &str,
    split: Option<&Split>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if visitor_id.trim().is_empty() {
        errors.push(FieldError::new("visitor", "must be present"));
    }

    if split.is_none() {
        errors.push(FieldError::new("split", "must be associated"));
    }

    if variant.trim().is_empty() {
        errors.push(FieldError::new("variant", "must be present"));
    } else if let Some(split) = split {
        if !split.has_variant(variant) {
            errors.push(FieldError::new(
                "variant",
                format!(
                    "must be specified in split '{}' current variations",
                    split.name
                ),
            ));
        }
    }

    errors
}
