//! Shared command utilities
//!
//! - `load_config` - Resolve configuration with CLI overrides
//! - `open_store` - Open the SQLite-backed store

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pennywise_core::{Config, SqliteStorage, Store};
use tracing::debug;

/// Load config file + environment, then apply `--db`
pub fn load_config(config_path: Option<&Path>, db_override: Option<&Path>) -> Result<Config> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    if let Some(db) = db_override {
        config.db_path = db.to_path_buf();
    }
    debug!(db = %config.db_path.display(), backend = config.insight.backend.as_str(), "Configuration loaded");
    Ok(config)
}

/// Open the store on the SQLite database at `db_path`
pub fn open_store(db_path: &Path) -> Result<Store> {
    let storage = SqliteStorage::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    Ok(Store::new(Arc::new(storage)))
}
