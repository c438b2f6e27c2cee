//! `splits snapshot` — the split → variant map across all assignments.
//!
//! One entry per split name: when several assignments share a split name,
//! the later row in storage retrieval order wins. Treat this as a global
//! convenience snapshot, not a per-visitor lookup.

use crate::cmd::open_store;
use crate::output::OutputMode;
use clap::Args;
use splits_core::db::query;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct SnapshotArgs {}

pub fn run_snapshot(
    _args: &SnapshotArgs,
    output: OutputMode,
    store_root: &Path,
) -> anyhow::Result<()> {
    let conn = open_store(store_root)?;
    let map = query::assignment_map(&conn)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if output.is_json() {
        serde_json::to_writer_pretty(&mut out, &map)?;
        writeln!(out)?;
    } else {
        for (split_name, variant) in &map {
            writeln!(out, "{split_name}\t{variant}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SnapshotArgs;
    use clap::Parser;

    #[test]
    fn snapshot_takes_no_args() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: SnapshotArgs,
        }
        assert!(Wrapper::try_parse_from(["test"]).is_ok());
        assert!(Wrapper::try_parse_from(["test", "extra"]).is_err());
    }
}
