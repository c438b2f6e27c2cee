//! Write path for the assignment store.
//!
//! Every mutation validates explicitly before touching the database and
//! returns [`StoreError`] so callers can branch on validation failures
//! versus storage-level constraint violations. The snapshot-then-mutate
//! contract lives in [`reassign`]: the previous-assignment snapshot and the
//! row update commit in a single `BEGIN IMMEDIATE` transaction so a crash
//! between them cannot leave history inconsistent with the current row.

use rusqlite::{Connection, TransactionBehavior, params};

use crate::db::query;
use crate::error::StoreError;
use crate::model::{
    Assignment, AssignmentChange, MixpanelResult, NewAssignment, PreviousAssignment, Split,
    Variant,
};
use crate::validate::validate_assignment;

/// Define a split or replace an existing split's variant registry.
///
/// Replacing the registry does not touch existing assignments; a stale
/// assignment fails re-validation on its next save instead.
///
/// # Errors
///
/// Returns [`StoreError::Storage`] on constraint violations (blank name,
/// blank variant, negative weight).
pub fn define_split(
    conn: &mut Connection,
    name: &str,
    variants: &[Variant],
    now_us: i64,
) -> Result<Split, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT INTO splits (name, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?2)
         ON CONFLICT(name) DO UPDATE SET updated_at_us = excluded.updated_at_us",
        params![name, now_us],
    )?;

    let split_id: i64 = tx.query_row(
        "SELECT split_id FROM splits WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;

    tx.execute(
        "DELETE FROM split_variants WHERE split_id = ?1",
        params![split_id],
    )?;
    for variant in variants {
        tx.execute(
            "INSERT INTO split_variants (split_id, variant, weight) VALUES (?1, ?2, ?3)",
            params![split_id, variant.name, variant.weight],
        )?;
    }

    let split = query::fetch_split_by_id(&tx, split_id)?
        .ok_or_else(|| StoreError::SplitNotFound(name.to_string()))?;
    tx.commit()?;

    tracing::info!(
        split = name,
        variants = split.variants.len(),
        "split defined"
    );
    Ok(split)
}

/// Idempotently register a visitor identity.
///
/// # Errors
///
/// Returns [`StoreError::Storage`] when the id is blank.
pub fn ensure_visitor(
    conn: &Connection,
    visitor_id: &str,
    now_us: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO visitors (visitor_id, created_at_us) VALUES (?1, ?2)",
        params![visitor_id, now_us],
    )?;
    Ok(())
}

/// Create an assignment, validating against the split's current registry.
///
/// # Errors
///
/// Returns [`StoreError::Validation`] with field-level errors when the
/// visitor, split, or variant is invalid; [`StoreError::Storage`] when a
/// constraint fires (e.g. the visitor already holds an assignment for this
/// split).
pub fn create_assignment(
    conn: &Connection,
    new: &NewAssignment,
    now_us: i64,
) -> Result<Assignment, StoreError> {
    let split = query::fetch_split_by_name(conn, &new.split_name)?;

    let errors = validate_assignment(&new.visitor_id, &new.variant, split.as_ref());
    if !errors.is_empty() {
        return Err(StoreError::Validation(errors));
    }
    let Some(split) = split else {
        return Err(StoreError::SplitNotFound(new.split_name.clone()));
    };

    ensure_visitor(conn, &new.visitor_id, now_us)?;

    conn.execute(
        "INSERT INTO assignments (
            visitor_id,
            split_id,
            variant,
            bulk_assignment_id,
            visitor_supersession_id,
            individually_overridden,
            context,
            mixpanel_result,
            created_at_us,
            updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            new.visitor_id,
            split.split_id,
            new.variant,
            new.bulk_assignment_id,
            new.visitor_supersession_id,
            i64::from(new.individually_overridden),
            new.context,
            new.mixpanel_result.map(MixpanelResult::as_str),
            now_us,
        ],
    )?;

    let assignment_id = conn.last_insert_rowid();
    let assignment = query::fetch_assignment(conn, assignment_id)?
        .ok_or(StoreError::AssignmentNotFound(assignment_id))?;

    tracing::info!(
        visitor = %assignment.visitor_id,
        split = %new.split_name,
        variant = %assignment.variant,
        "assignment created"
    );
    Ok(assignment)
}

/// Snapshot an assignment's current state into `previous_assignments`.
///
/// The snapshot's `created_at_us` is the assignment's current
/// `updated_at_us` (when the about-to-be-overwritten value was last set) and
/// `superseded_at_us` is `now_us`. Callers must invoke this *before*
/// mutating the row, and own the transaction wrapping snapshot and update;
/// [`reassign`] does both.
///
/// # Errors
///
/// Returns [`StoreError::Storage`] when a constraint fires.
pub fn create_previous_assignment(
    conn: &Connection,
    assignment: &Assignment,
    now_us: i64,
) -> Result<PreviousAssignment, StoreError> {
    conn.execute(
        "INSERT INTO previous_assignments (
            assignment_id,
            variant,
            bulk_assignment_id,
            individually_overridden,
            visitor_supersession_id,
            context,
            created_at_us,
            superseded_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            assignment.assignment_id,
            assignment.variant,
            assignment.bulk_assignment_id,
            i64::from(assignment.individually_overridden),
            assignment.visitor_supersession_id,
            assignment.context,
            assignment.updated_at_us,
            now_us,
        ],
    )?;

    Ok(PreviousAssignment {
        previous_assignment_id: conn.last_insert_rowid(),
        assignment_id: assignment.assignment_id,
        variant: assignment.variant.clone(),
        bulk_assignment_id: assignment.bulk_assignment_id,
        individually_overridden: assignment.individually_overridden,
        visitor_supersession_id: assignment.visitor_supersession_id,
        context: assignment.context.clone(),
        created_at_us: assignment.updated_at_us,
        superseded_at_us: now_us,
    })
}

/// Reassign an existing assignment: snapshot, then mutate, in one
/// transaction.
///
/// The replacement variant is re-validated against the split's *current*
/// registry, which may have changed since the original assignment.
///
/// # Errors
///
/// Returns [`StoreError::AssignmentNotFound`] for an unknown id,
/// [`StoreError::Validation`] when the replacement fields are invalid, or
/// [`StoreError::Storage`] when a constraint fires.
pub fn reassign(
    conn: &mut Connection,
    assignment_id: i64,
    change: &AssignmentChange,
    now_us: i64,
) -> Result<Assignment, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let assignment = query::fetch_assignment(&tx, assignment_id)?
        .ok_or(StoreError::AssignmentNotFound(assignment_id))?;
    let split = query::fetch_split_by_id(&tx, assignment.split_id)?;

    let errors = validate_assignment(&assignment.visitor_id, &change.variant, split.as_ref());
    if !errors.is_empty() {
        return Err(StoreError::Validation(errors));
    }

    create_previous_assignment(&tx, &assignment, now_us)?;

    tx.execute(
        "UPDATE assignments SET
            variant = ?1,
            bulk_assignment_id = ?2,
            visitor_supersession_id = ?3,
            individually_overridden = ?4,
            context = ?5,
            updated_at_us = ?6
         WHERE assignment_id = ?7",
        params![
            change.variant,
            change.bulk_assignment_id,
            change.visitor_supersession_id,
            i64::from(change.individually_overridden),
            change.context,
            now_us,
            assignment_id,
        ],
    )?;

    let updated = query::fetch_assignment(&tx, assignment_id)?
        .ok_or(StoreError::AssignmentNotFound(assignment_id))?;
    tx.commit()?;

    tracing::info!(
        visitor = %updated.visitor_id,
        assignment_id,
        from = %assignment.variant,
        to = %updated.variant,
        "assignment superseded"
    );
    Ok(updated)
}

/// Record the outcome of a Mixpanel reporting attempt.
///
/// Sync state is bookkeeping: recording a result does not bump
/// `updated_at_us`, so later supersession snapshots still reflect the last
/// assignment mutation.
///
/// # Errors
///
/// Returns [`StoreError::AssignmentNotFound`] for an unknown id.
pub fn record_mixpanel_result(
    conn: &Connection,
    assignment_id: i64,
    result: MixpanelResult,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE assignments SET mixpanel_result = ?1 WHERE assignment_id = ?2",
        params![result.as_str(), assignment_id],
    )?;
    if updated == 0 {
        return Err(StoreError::AssignmentNotFound(assignment_id));
    }

    tracing::debug!(assignment_id, result = %result, "mixpanel result recorded");
    Ok(())
}

/// Record a batch operation that produced assignments.
///
/// # Errors
///
/// Returns [`StoreError::Storage`] on foreign-key or constraint failures.
pub fn create_bulk_assignment(
    conn: &Connection,
    split_id: i64,
    variant: &str,
    now_us: i64,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO bulk_assignments (split_id, variant, created_at_us) VALUES (?1, ?2, ?3)",
        params![split_id, variant, now_us],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record that one visitor identity superseded another (visitor merge).
///
/// # Errors
///
/// Returns [`StoreError::Storage`] when either visitor is unknown or the
/// two ids are equal.
pub fn create_visitor_supersession(
    conn: &Connection,
    superseded_visitor_id: &str,
    superseding_visitor_id: &str,
    now_us: i64,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO visitor_supersessions (
            superseded_visitor_id,
            superseding_visitor_id,
            created_at_us
         ) VALUES (?1, ?2, ?3)",
        params![superseded_visitor_id, superseding_visitor_id, now_us],
    )?;
    Ok(conn.last_insert_rowid())
}
