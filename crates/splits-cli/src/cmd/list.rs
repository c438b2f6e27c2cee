//! `splits list` — list assignments with filtering.

use crate::cmd::open_store;
use crate::output::{OutputMode, render_list};
use crate::views::AssignmentView;
use clap::Args;
use splits_core::db::query::{self, AssignmentFilter};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by split name.
    #[arg(short, long)]
    pub split: Option<String>,

    /// Filter by visitor id.
    #[arg(long)]
    pub visitor: Option<String>,

    /// Only assignments still awaiting a successful Mixpanel report.
    #[arg(long)]
    pub unsynced: bool,

    /// Maximum assignments to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: u32,

    /// Offset for pagination.
    #[arg(long)]
    pub offset: Option<u32>,
}

pub fn run_list(args: &ListArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    let conn = open_store(store_root)?;

    let filter = AssignmentFilter {
        visitor_id: args.visitor.clone(),
        split_name: args.split.clone(),
        unsynced_only: args.unsynced,
        limit: Some(args.limit),
        offset: args.offset,
    };
    let assignments = query::list_assignments(&conn, &filter)?;
    let names = query::split_names(&conn)?;

    let views: Vec<AssignmentView> = assignments
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

#[cfg(test)]
mod tests {
    use super::ListArgs;
    use clap::Parser;

    #[test]
    fn list_args_defaults() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ListArgs,
        }
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.split.is_none());
        assert!(w.args.visitor.is_none());
        assert!(!w.args.unsynced);
        assert_eq!(w.args.limit, 50);
    }

    #[test]
    fn list_args_filters_parse() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ListArgs,
        }
        let w = Wrapper::parse_from([
            "test",
            "--split",
            "button_color",
            "--unsynced",
            "-n",
            "5",
        ]);
        assert_eq!(w.args.split.as_deref(), Some("button_color"));
        assert!(w.args.unsynced);
        assert_eq!(w.args.limit, 5);
    }
}
