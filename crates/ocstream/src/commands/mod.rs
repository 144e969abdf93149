//! Command handlers and the config/store resolution they share.

pub mod config_cmd;
pub mod devices;
pub mod run;

use std::path::PathBuf;

use ocstream_config::CollectorConfig;
use ocstream_core::FileStore;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(ocstream_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<CollectorConfig, CliError> {
    Ok(ocstream_config::load_config(Some(&config_path(global)))?)
}

/// `--store`, else `store_path` from the configuration.
pub fn open_store(global: &GlobalOpts, cfg: &CollectorConfig) -> FileStore {
    FileStore::new(global.store.clone().unwrap_or_else(|| cfg.store_path()))
}
