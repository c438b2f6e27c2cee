//! splits-core: entities, validation, and the SQLite assignment store.
//!
//! # Conventions
//!
//! - **Errors**: write paths return [`error::StoreError`] so callers can
//!   branch on validation vs. storage failures; query helpers return
//!   `anyhow::Result`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Timestamps**: microseconds since the Unix epoch in `_us` columns,
//!   produced by [`clock::now_us`].

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod model;
pub mod sync;
pub mod validate;
