#![forbid(unsafe_code)]

mod cmd;
mod output;
mod views;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use splits_core::config;
use splits_core::error::ErrorCode;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "splits: SQLite-backed assignment store for split testing",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, env, and user config.
    fn output_mode(&self, store_root: &std::path::Path) -> OutputMode {
        if let Some(mode) = self.format {
            return mode;
        }
        config::resolve_config(store_root, self.json).map_or(
            if self.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            },
            |effective| OutputMode::from_resolved(&effective.resolved_output),
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a splits store",
        long_about = "Initialize a splits store in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a store in the current directory\n    splits init\n\n    # Emit machine-readable output\n    splits init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Define a split's variant registry",
        long_about = "Define a split, or replace an existing split's variant registry.",
        after_help = "EXAMPLES:\n    # Define a split with two weighted variants\n    splits define button_color -v red:50 -v blue:50\n\n    # Replace the registry (existing assignments go stale on next save)\n    splits define button_color -v red"
    )]
    Define(cmd::define::DefineArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Assign a visitor to a variant",
        long_about = "Create an assignment, or supersede the visitor's existing one (the prior state is snapshotted first).",
        after_help = "EXAMPLES:\n    # First assignment\n    splits assign v-42 button_color red\n\n    # Reassign, keeping history\n    splits assign v-42 button_color blue\n\n    # Manual override with context\n    splits assign v-42 button_color blue --override --context support_ticket"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a visitor's current assignment",
        after_help = "EXAMPLES:\n    # Show the current assignment\n    splits show v-42 button_color\n\n    # Emit machine-readable output\n    splits show v-42 button_color --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List assignments",
        long_about = "List assignments with optional filters.",
        after_help = "EXAMPLES:\n    # List assignments for a split\n    splits list --split button_color\n\n    # Only assignments awaiting Mixpanel sync\n    splits list --unsynced"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show supersession history",
        long_about = "Show the previous-assignment snapshots for a visitor's assignment, newest first.",
        after_help = "EXAMPLES:\n    # Show history after reassignments\n    splits history v-42 button_color"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Read",
        about = "Dump the split → variant map",
        long_about = "Dump one variant per split name across all assignments (later rows win for duplicate names).",
        after_help = "EXAMPLES:\n    # Tab-separated snapshot\n    splits snapshot\n\n    # JSON object\n    splits snapshot --json"
    )]
    Snapshot(cmd::snapshot::SnapshotArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show store stats",
        after_help = "EXAMPLES:\n    splits status\n    splits status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Show the unsynced-to-Mixpanel queue",
        long_about = "Show assignments whose last Mixpanel attempt is missing or failed; the sync job's work queue.",
        after_help = "EXAMPLES:\n    # Default batch (from config)\n    splits queue\n\n    # Bounded batch\n    splits queue -n 10"
    )]
    Queue(cmd::queue::QueueArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Record a Mixpanel reporting outcome",
        long_about = "Write back success or failure for an assignment; failures stay queued for retry.",
        after_help = "EXAMPLES:\n    splits record 42 success\n    splits record 42 failure"
    )]
    Record(cmd::record::RecordArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    splits completions bash\n\n    # Generate zsh completions\n    splits completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SPLITS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "splits=debug,info"
        } else {
            "splits=info,warn"
        })
    });

    let format = env::var("SPLITS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

/// Resolve the store root for commands that need an existing store.
fn require_store_root(cwd: &std::path::Path, output: OutputMode) -> anyhow::Result<PathBuf> {
    config::find_store_root(cwd).map_or_else(
        || {
            let code = ErrorCode::NotInitialized;
            render_error(
                output,
                &CliError::with_details(
                    code.message(),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("{}", code.message());
        },
        Ok,
    )
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let cwd = std::env::current_dir()?;
    let output = cli.output_mode(&cwd);

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &cwd),
        Commands::Define(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::define::run_define(args, output, &root)
        }
        Commands::Assign(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::assign::run_assign(args, output, &root)
        }
        Commands::Show(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::show::run_show(args, output, &root)
        }
        Commands::List(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::list::run_list(args, output, &root)
        }
        Commands::History(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::history::run_history(args, output, &root)
        }
        Commands::Snapshot(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::snapshot::run_snapshot(args, output, &root)
        }
        Commands::Status(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::status::run_status(args, output, &root)
        }
        Commands::Queue(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::queue::run_queue(args, output, &root)
        }
        Commands::Record(ref args) => {
            let root = require_store_root(&cwd, output)?;
            cmd::record::run_record(args, output, &root)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["splits", "--json", "list"]);
        assert!(cli.json);
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["splits", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_overrides_everything() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cli = Cli::parse_from(["splits", "--format", "json", "list"]);
        assert!(cli.output_mode(dir.path()).is_json());
    }

    #[test]
    fn quiet_flag_parsed() {
        let cli = Cli::parse_from(["splits", "-q", "list"]);
        assert!(cli.quiet);
    }

    #[test]
    fn assign_subcommand_parses() {
        let cli = Cli::parse_from(["splits", "assign", "v-1", "button_color", "red"]);
        assert!(matches!(cli.command, Commands::Assign(_)));
    }

    #[test]
    fn define_subcommand_parses() {
        let cli = Cli::parse_from(["splits", "define", "button_color", "-v", "red"]);
        assert!(matches!(cli.command, Commands::Define(_)));
    }

    #[test]
    fn record_subcommand_parses() {
        let cli = Cli::parse_from(["splits", "record", "7", "failure"]);
        assert!(matches!(cli.command, Commands::Record(_)));
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["splits", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["splits", "init"],
            vec!["splits", "define", "s", "-v", "a"],
            vec!["splits", "assign", "v", "s", "a"],
            vec!["splits", "show", "v", "s"],
            vec!["splits", "list"],
            vec!["splits", "history", "v", "s"],
            vec!["splits", "snapshot"],
            vec!["splits", "status"],
            vec!["splits", "queue"],
            vec!["splits", "record", "1", "success"],
            vec!["splits", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(
                result.is_ok(),
                "Failed to parse: {:?} — error: {:?}",
                args,
                result.err()
            );
        }
    }
}
