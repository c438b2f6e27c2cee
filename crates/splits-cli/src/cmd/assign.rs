//! `splits assign` — place a visitor into a split, or supersede an existing
//! assignment.
//!
//! When the visitor already holds an assignment for the split, the previous
//! state is snapshotted and the row mutated in one transaction; otherwise a
//! fresh assignment is created.

use crate::cmd::{acquire_write_lock, fail, open_store};
use crate::output::{OutputMode, render_item};
use crate::views::AssignmentView;
use clap::Args;
use splits_core::clock;
use splits_core::db::{query, store};
use splits_core::model::{AssignmentChange, NewAssignment};
use std::path::Path;

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Visitor identity.
    pub visitor: String,

    /// Split name.
    pub split: String,

    /// Variant to assign (must be in the split's current registry).
    pub variant: String,

    /// Opaque context carried alongside the assignment.
    #[arg(long)]
    pub context: Option<String>,

    /// Mark as a manual override outside the normal assignment flow.
    #[arg(long = "override")]
    pub individually_overridden: bool,

    /// Bulk-assignment id that produced this assignment.
    #[arg(long)]
    pub bulk: Option<i64>,

    /// Visitor-supersession id that carried this assignment forward.
    #[arg(long)]
    pub supersession: Option<i64>,
}

pub fn run_assign(args: &AssignArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let _lock = acquire_write_lock(store_root)?;
    let mut conn = open_store(store_root)?;
    let now_us = clock::now_us();

    let existing = query::assignment_for(&conn, &args.visitor, &args.split)?;

    let assignment = match existing {
        Some(current) => store::reassign(
            &mut conn,
            current.assignment_id,
            &AssignmentChange {
                variant: args.variant.clone(),
                bulk_assignment_id: args.bulk,
                visitor_supersession_id: args.supersession,
                individually_overridden: args.individually_overridden,
                context: args.context.clone(),
            },
            now_us,
        )
        .map_err(|err| fail(output, err))?,
        None => store::create_assignment(
            &conn,
            &NewAssignment {
                visitor_id: args.visitor.clone(),
                split_name: args.split.clone(),
                variant: args.variant.clone(),
                bulk_assignment_id: args.bulk,
                visitor_supersession_id: args.supersession,
                individually_overridden: args.individually_overridden,
                context: args.context.clone(),
                mixpanel_result: None,
            },
            now_us,
        )
        .map_err(|err| fail(output, err))?,
    };

    render_item(&AssignmentView::new(args.split.clone(), assignment), output)?;
    Ok(())
}
