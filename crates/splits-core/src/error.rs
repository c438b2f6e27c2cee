use crate::validate::FieldError;
use std::fmt;
use thiserror::Error;

/// Machine-readable error codes for scripted and agent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    SplitNotFound,
    AssignmentNotFound,
    ValidationFailed,
    InvalidSyncResult,
    ConstraintViolation,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::SplitNotFound => "E2001",
            Self::AssignmentNotFound => "E2002",
            Self::ValidationFailed => "E2003",
            Self::InvalidSyncResult => "E2004",
            Self::ConstraintViolation => "E3001",
            Self::LockContention => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::SplitNotFound => "Split not defined",
            Self::AssignmentNotFound => "Assignment not found",
            Self::ValidationFailed => "Assignment validation failed",
            Self::InvalidSyncResult => "Invalid sync result value",
            Self::ConstraintViolation => "Storage constraint violated",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `splits init` to create a store here."),
            Self::ConfigParseError => Some("Fix syntax in .splits/config.toml and retry."),
            Self::SplitNotFound => Some("Define the split first: `splits define <name> --variant ...`."),
            Self::AssignmentNotFound => None,
            Self::ValidationFailed => {
                Some("Check the reported fields; variants must be in the split's current set.")
            }
            Self::InvalidSyncResult => Some("Use `success` or `failure`."),
            Self::ConstraintViolation => None,
            Self::LockContention => Some("Retry after the other `splits` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures produced by the assignment store's write and lookup paths.
///
/// Validation failures are recoverable and carry field-level errors; storage
/// constraint violations surface the underlying SQLite error unrecovered.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not initialized")]
    NotInitialized,

    #[error("split '{0}' is not defined")]
    SplitNotFound(String),

    #[error("assignment {0} not found")]
    AssignmentNotFound(i64),

    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::SplitNotFound(_) => ErrorCode::SplitNotFound,
            Self::AssignmentNotFound(_) => ErrorCode::AssignmentNotFound,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Storage(_) => ErrorCode::ConstraintViolation,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        self.error_code().hint()
    }

    /// The field-level errors for a validation failure, empty otherwise.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}
