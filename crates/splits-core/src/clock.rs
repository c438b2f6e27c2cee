//! Wall-clock helpers for the `_us` timestamp columns.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as microseconds since the Unix epoch.
///
/// Saturates at `i64::MAX` rather than panicking on a far-future clock.
#[must_use]
pub fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
}
