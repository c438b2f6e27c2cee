//! `splits history` — supersession snapshots for a visitor's assignment.

use crate::cmd::open_store;
use crate::output::{CliError, OutputMode, render_error, render_list};
use crate::views::HistoryView;
use clap::Args;
use splits_core::db::query;
use splits_core::error::ErrorCode;
use std::path::Path;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Visitor identity.
    pub visitor: String,

    /// Split name.
    pub split: String,
}

pub fn run_history(args: &HistoryArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let conn = open_store(store_root)?;

    let Some(assignment) = query::assignment_for(&conn, &args.visitor, &args.split)? else {
        let message = format!(
            "no assignment for visitor '{}' in split '{}'",
            args.visitor, args.split
        );
        render_error(
            output,
            &CliError::with_details(
                &message,
                "Use `splits assign` to place the visitor first.",
                ErrorCode::AssignmentNotFound.code(),
            ),
        )?;
        anyhow::bail!("{message}");
    };

    let snapshots = query::previous_assignments(&conn, assignment.assignment_id)?;
    let views: Vec<HistoryView> = snapshots
        .into_iter()
        .map(|snapshot| HistoryView { snapshot })
        .collect();

    render_list(&views, output)?;
    Ok(())
}
