use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Directory (under the store root) holding the database, lock, and config.
pub const STORE_DIR: &str = ".splits";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum unsynced assignments drained per sync pass.
    #[serde(default = "default_sync_batch_size")]
    pub batch_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_sync_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Preferred output mode: `pretty`, `text`, or `json`.
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub store: StoreConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Walk up from `start` looking for a directory containing `.splits/`.
#[must_use]
pub fn find_store_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(STORE_DIR).is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Path of the SQLite database under a store root.
#[must_use]
pub fn db_path(store_root: &Path) -> PathBuf {
    store_root.join(STORE_DIR).join("assignments.sqlite3")
}

/// Path of the advisory lock file under a store root.
#[must_use]
pub fn lock_path(store_root: &Path) -> PathBuf {
    store_root.join(STORE_DIR).join("store.lock")
}

/// Write a default `.splits/config.toml` if none exists yet.
///
/// Returns the config path. Leaves an existing file untouched.
///
/// # Errors
///
/// Returns an error when the directory or file cannot be written.
pub fn write_default_config(store_root: &Path) -> Result<PathBuf> {
    let dir = store_root.join(STORE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create store directory {}", dir.display()))?;

    let path = dir.join("config.toml");
    if !path.exists() {
        let rendered =
            toml::to_string_pretty(&StoreConfig::default()).context("serialize default config")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("write default config {}", path.display()))?;
    }
    Ok(path)
}

/// Load `.splits/config.toml`, defaulting every field when absent.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_store_config(store_root: &Path) -> Result<StoreConfig> {
    let path = store_root.join(STORE_DIR).join("config.toml");
    if !path.exists() {
        return Ok(StoreConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<StoreConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the user-level config from the platform config directory.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("splits/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge store config, user config, and CLI flags into one view.
///
/// # Errors
///
/// Returns an error when either config file is unreadable or malformed.
pub fn resolve_config(store_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let store = load_store_config(store_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        store,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some("pretty"),
            "text" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_sync_batch_size() -> u32 {
    100
}

#[cfg(test)]
mod tests {
    use super::{
        StoreConfig, find_store_root, load_store_config, resolve_output,
    };
    use std::fs;

    #[test]
    fn missing_store_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = load_store_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.sync.batch_size, 100);
    }

    #[test]
    fn store_config_parses_sync_section() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let splits_dir = dir.path().join(".splits");
        fs::create_dir_all(&splits_dir).expect("create .splits");
        fs::write(splits_dir.join("config.toml"), "[sync]\nbatch_size = 25\n")
            .expect("write config");

        let cfg = load_store_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.sync.batch_size, 25);
    }

    #[test]
    fn malformed_store_config_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let splits_dir = dir.path().join(".splits");
        fs::create_dir_all(&splits_dir).expect("create .splits");
        fs::write(splits_dir.join("config.toml"), "[sync\nbatch_size = 25\n")
            .expect("write config");

        assert!(load_store_config(dir.path()).is_err());
    }

    #[test]
    fn find_store_root_walks_up() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join(".splits")).expect("create .splits");
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).expect("create nested dirs");

        let root = find_store_root(&nested).expect("root should be found");
        assert_eq!(root, dir.path());
    }

    #[test]
    fn find_store_root_returns_none_without_store() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(find_store_root(dir.path()).is_none());
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn env_format_beats_user_config() {
        let output = resolve_output(false, Some("pretty".to_string()), Some("json".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn write_default_config_is_idempotent_and_preserves_edits() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = super::write_default_config(dir.path()).expect("write default");
        assert!(path.exists());

        fs::write(&path, "[sync]\nbatch_size = 7\n").expect("edit config");
        super::write_default_config(dir.path()).expect("second write");

        let cfg = load_store_config(dir.path()).expect("load");
        assert_eq!(cfg.sync.batch_size, 7);
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let cfg = StoreConfig::default();
        let rendered = toml::to_string(&cfg).expect("serialize");
        let reparsed: StoreConfig = toml::from_str(&rendered).expect("parse");
        assert_eq!(reparsed.sync.batch_size, cfg.sync.batch_size);
    }
}
