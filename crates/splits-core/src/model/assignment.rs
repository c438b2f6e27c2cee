use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Outcome of the most recent Mixpanel reporting attempt for an assignment.
///
/// The persisted column is nullable: `None` means no attempt has been made
/// yet. A recorded `Failure` keeps the assignment in the unsynced queue so
/// the external sync job retries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixpanelResult {
    Success,
    Failure,
}

impl MixpanelResult {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for MixpanelResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MixpanelResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(ParseEnumError {
                expected: "mixpanel result",
                got: s.to_string(),
            }),
        }
    }
}

/// Normalize raw result input at the deserialization boundary.
///
/// Blank or whitespace-only input maps to `None` (no attempt recorded).
/// Anything else must be exactly `success` or `failure` after trimming.
///
/// # Errors
///
/// Returns [`ParseEnumError`] for non-blank input that is neither value.
pub fn parse_mixpanel_result(raw: &str) -> Result<Option<MixpanelResult>, ParseEnumError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    MixpanelResult::from_str(trimmed).map(Some)
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

/// A persisted assignment row: which variant a visitor holds for a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: i64,
    pub visitor_id: String,
    pub split_id: i64,
    pub variant: String,
    pub bulk_assignment_id: Option<i64>,
    pub visitor_supersession_id: Option<i64>,
    pub individually_overridden: bool,
    pub context: Option<String>,
    pub mixpanel_result: Option<MixpanelResult>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Assignment {
    /// True when the assignment still needs (re-)reporting to Mixpanel:
    /// no attempt recorded yet, or the last attempt failed.
    #[must_use]
    pub const fn is_unsynced(&self) -> bool {
        !matches!(self.mixpanel_result, Some(MixpanelResult::Success))
    }
}

/// Input for creating an assignment. The split is referenced by name and
/// resolved (and validated against) at write time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAssignment {
    pub visitor_id: String,
    pub split_name: String,
    pub variant: String,
    pub bulk_assignment_id: Option<i64>,
    pub visitor_supersession_id: Option<i64>,
    pub individually_overridden: bool,
    pub context: Option<String>,
    pub mixpanel_result: Option<MixpanelResult>,
}

/// Replacement fields for reassigning an existing assignment.
///
/// The write path snapshots the current row before applying these.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentChange {
    pub variant: String,
    pub bulk_assignment_id: Option<i64>,
    pub visitor_supersession_id: Option<i64>,
    pub individually_overridden: bool,
    pub context: Option<String>,
}

/// Historical snapshot taken immediately before an assignment is overwritten.
///
/// `created_at_us` carries the superseded assignment's prior `updated_at_us`
/// (when the overwritten value was last set); `superseded_at_us` is the
/// moment of supersession. Snapshots are created, never updated or deleted,
/// except by cascade when their parent assignment is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousAssignment {
    pub previous_assignment_id: i64,
    pub assignment_id: i64,
    pub variant: String,
    pub bulk_assignment_id: Option<i64>,
    pub individually_overridden: bool,
    pub visitor_supersession_id: Option<i64>,
    pub context: Option<String>,
    pub created_at_us: i64,
    pub superseded_at_us: i64,
}
