//! `splits record` — write back a Mixpanel reporting outcome.

use crate::cmd::{acquire_write_lock, fail, open_store};
use crate::output::{CliError, OutputMode, render_error, render_success};
use clap::Args;
use splits_core::db::store;
use splits_core::error::ErrorCode;
use splits_core::model::parse_mixpanel_result;
use std::path::Path;

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Assignment id from `splits queue`.
    pub assignment_id: i64,

    /// Reporting outcome: `success` or `failure`.
    pub result: String,
}

fn invalid_result(output: OutputMode, message: &str) -> anyhow::Result<()> {
    render_error(
        output,
        &CliError::with_details(
            message,
            "Use `success` or `failure`.",
            ErrorCode::InvalidSyncResult.code(),
        ),
    )
}

pub fn run_record(args: &RecordArgs, output: OutputMode, store_root: &Path) -> anyhow::Result<()> {
    // Blank input normalizes to "no result" rather than an invalid value;
    // either way there is nothing to record.
    let result = match parse_mixpanel_result(&args.result) {
        Ok(Some(result)) => result,
        Ok(None) => {
            invalid_result(output, "no result given")?;
            anyhow::bail!("no result given");
        }
        Err(parse_err) => {
            invalid_result(output, &parse_err.to_string())?;
            anyhow::bail!("{parse_err}");
        }
    };

    let _lock = acquire_write_lock(store_root)?;
    let conn = open_store(store_root)?;

    store::record_mixpanel_result(&conn, args.assignment_id, result)
        .map_err(|err| fail(output, err))?;

    render_success(
        output,
        &format!("recorded {result} for assignment {}", args.assignment_id),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::RecordArgs;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RecordArgs,
    }

    #[test]
    fn record_args_parse() {
        let w = Wrapper::parse_from(["test", "42", "success"]);
        assert_eq!(w.args.assignment_id, 42);
        assert_eq!(w.args.result, "success");
    }

    #[test]
    fn record_requires_both_positionals() {
        assert!(Wrapper::try_parse_from(["test", "42"]).is_err());
    }
}
