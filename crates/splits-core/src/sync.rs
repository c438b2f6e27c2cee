//! Seam for the external Mixpanel sync job.
//!
//! The job itself lives outside this crate; what it needs from the store is
//! a work queue (`unsynced_to_mixpanel`) and result write-back
//! (`record_mixpanel_result`). [`drain_unsynced`] packages the loop: pull a
//! batch, report each assignment through a [`Reporter`], and record
//! `success`/`failure` per attempt. Failed rows stay in the queue — the
//! queue *is* the retry mechanism; there is no in-process retry.

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::db::{query, store};
use crate::model::{Assignment, MixpanelResult};

/// Destination for assignment reports. Implementations wrap the external
/// analytics client.
pub trait Reporter {
    /// Report a single assignment. An `Err` marks the row `failure` and
    /// leaves it queued for the next drain.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the external system rejects or
    /// cannot receive the report.
    fn report(&mut self, assignment: &Assignment) -> Result<()>;
}

/// Statistics returned after a drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Assignments reported and marked `success`.
    pub reported: usize,
    /// Assignments whose report failed and were marked `failure`.
    pub failed: usize,
}

/// Drain up to `batch_limit` unsynced assignments through `reporter`.
///
/// Each attempt's outcome is recorded individually; a failing report is
/// logged and counted, never aborting the batch.
///
/// # Errors
///
/// Returns an error only when the store itself fails (queue query or result
/// write-back); reporter failures are absorbed into `stats.failed`.
pub fn drain_unsynced(
    conn: &Connection,
    reporter: &mut dyn Reporter,
    batch_limit: u32,
) -> Result<SyncStats> {
    let queue = query::unsynced_to_mixpanel(conn, Some(batch_limit))
        .context("load unsynced queue")?;

    let mut stats = SyncStats::default();
    for assignment in &queue {
        match reporter.report(assignment) {
            Ok(()) => {
                store::record_mixpanel_result(
                    conn,
                    assignment.assignment_id,
                    MixpanelResult::Success,
                )
                .context("record sync success")?;
                stats.reported += 1;
            }
            Err(error) => {
                tracing::warn!(
                    assignment_id = assignment.assignment_id,
                    visitor = %assignment.visitor_id,
                    error = %error,
                    "mixpanel report failed; leaving assignment queued"
                );
                store::record_mixpanel_result(
                    conn,
                    assignment.assignment_id,
                    MixpanelResult::Failure,
                )
                .context("record sync failure")?;
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        reported = stats.reported,
        failed = stats.failed,
        "sync drain finished"
    );
    Ok(stats)
}
