//! `splits queue` — assignments awaiting a successful Mixpanel report.
//!
//! This is the external sync job's work queue; each drained record gets its
//! outcome written back with `splits record`.

use crate::cmd::open_store;
use crate::output::{OutputMode, render_list};
use crate::views::AssignmentView;
use clap::Args;
use splits_core::config;
use splits_core::db::query;
use std::path::Path;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Maximum queue entries to show (default: the configured sync batch size).
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,
}

pub fn run_queue(args: &QueueArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let conn = open_store(store_root)?;

    let limit = match args.limit {
        Some(limit) => limit,
        None => config::load_store_config(store_root)?.sync.batch_size,
    };
    let queue = query::unsynced_to_mixpanel(&conn, Some(limit))?;
    let names = query::split_names(&conn)?;

    let views: Vec<AssignmentView> = queue
        .into_iter()
        .map(|assignment| {
            let split_name = names
                .get(&assignment.split_id)
                .cloned()
                .unwrap_or_else(|| assignment.split_id.to_string());
            AssignmentView::new(split_name, assignment)
        })
        .collect();

    render_list(&views, output)?;
    Ok(())
}
