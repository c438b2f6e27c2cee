//! One module per CLI command: an `Args` struct plus a `run_*` handler.

pub mod assign;
pub mod completions;
pub mod define;
pub mod history;
pub mod init;
pub mod list;
pub mod queue;
pub mod record;
pub mod show;
pub mod snapshot;
pub mod status;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Result;
use rusqlite::Connection;
use splits_core::error::StoreError;
use splits_core::lock::StoreLock;
use splits_core::{config, db};
use std::path::Path;
use std::time::Duration;

/// Timeout for the store-wide write lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the store database under `store_root`.
pub(crate) fn open_store(store_root: &Path) -> Result<Connection> {
    db::open_store(&config::db_path(store_root))
}

/// Acquire the exclusive write lock for a mutating command.
pub(crate) fn acquire_write_lock(store_root: &Path) -> Result<StoreLock> {
    StoreLock::acquire(&config::lock_path(store_root), LOCK_TIMEOUT)
        .map_err(anyhow::Error::new)
}

/// Render a store error and convert it into a command failure.
pub(crate) fn fail(output: OutputMode, err: StoreError) -> anyhow::Error {
    let cli_error = CliError::from(&err);
    if let Err(render_err) = render_error(output, &cli_error) {
        return render_err;
    }
    anyhow::Error::new(err)
}
