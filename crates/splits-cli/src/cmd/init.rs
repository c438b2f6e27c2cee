//! `splits init` — create the store in the current directory.

use crate::output::{OutputMode, render_success};
use clap::Args;
use splits_core::{config, db};
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {}

pub fn run_init(_args: &InitArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let already_initialized = cwd.join(config::STORE_DIR).is_dir();

    config::write_default_config(cwd)?;
    let conn = db::open_store(&config::db_path(cwd))?;
    drop(conn);

    if already_initialized {
        render_success(output, "store already initialized; schema is up to date")?;
    } else {
        render_success(output, &format!("initialized splits store in {}", cwd.display()))?;
    }
    Ok(())
}
