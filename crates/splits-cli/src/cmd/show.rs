//! `splits show` — current assignment for a visitor and split.

use crate::cmd::open_store;
use crate::output::{CliError, OutputMode, render_error, render_item};
use crate::views::AssignmentView;
use clap::Args;
use splits_core::db::query;
use splits_core::error::ErrorCode;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Visitor identity.
    pub visitor: String,

    /// Split name.
    pub split: String,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
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

    render_item(&AssignmentView::new(args.split.clone(), assignment), output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ShowArgs;
    use clap::Parser;

    #[test]
    fn show_args_parse() {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ShowArgs,
        }
        let w = Wrapper::parse_from(["test", "v-1", "button_color"]);
        assert_eq!(w.args.visitor, "v-1");
        assert_eq!(w.args.split, "button_color");
    }
}
