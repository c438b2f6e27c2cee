//! `splits status` — store-level stats.

use crate::cmd::open_store;
use crate::output::{OutputMode, render_item};
use crate::views::StatusView;
use clap::Args;
use splits_core::db::query;
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn run_status(_args: &StatusArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let conn = open_store(store_root)?;
    let stats = query::store_stats(&conn)?;
    render_item(&StatusView { stats }, output)?;
    Ok(())
}
