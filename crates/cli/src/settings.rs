//! Layered configuration: built-in defaults, optional TOML file, `UPNEXT_*` env

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use upnext_core::application::constants::{
    DEFAULT_HISTORY_VIEW_LIMIT, DEFAULT_MAX_CONFLICT_RETRIES, DEFAULT_POLL_INTERVAL_MS,
};
use upnext_core::application::SyncConfig;

pub const DEFAULT_CONFIG_PATH: &str = "~/.upnext/config.toml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://~/.upnext/store.db";
const ENV_PREFIX: &str = "UPNEXT";
const SQLITE_PREFIX: &str = "sqlite://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    /// Process-local, gone on exit
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub store: StoreBackend,
    pub log_format: LogFormat,
    pub history_limit: usize,
    pub optimistic_versioning: bool,
    pub max_conflict_retries: u32,
    pub poll_interval_ms: u64,
}

impl Settings {
    /// Load settings; an explicit `config_path` must exist, the default one may not
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::from_sources(path, true),
            None => {
                let default_path = PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref());
                Self::from_sources(&default_path, false)
            }
        }
    }

    fn from_sources(path: &Path, required: bool) -> Result<Self> {
        let settings = Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("store", "sqlite")?
            .set_default("log_format", "pretty")?
            .set_default("history_limit", DEFAULT_HISTORY_VIEW_LIMIT as i64)?
            .set_default("optimistic_versioning", false)?
            .set_default("max_conflict_retries", DEFAULT_MAX_CONFLICT_RETRIES as i64)?
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS as i64)?
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            history_view_limit: self.history_limit,
            optimistic_versioning: self.optimistic_versioning,
            max_conflict_retries: self.max_conflict_retries,
        }
    }

    /// Database url with `~` expanded in the path part
    pub fn resolved_database_url(&self) -> String {
        match self.database_url.strip_prefix(SQLITE_PREFIX) {
            Some(path) => format!("{}{}", SQLITE_PREFIX, shellexpand::tilde(path)),
            None => shellexpand::tilde(&self.database_url).into_owned(),
        }
    }

    /// On-disk database file, if the url names one
    pub fn database_file(&self) -> Option<PathBuf> {
        let url = self.resolved_database_url();
        if url.contains(":memory:") || url.contains("mode=memory") {
            return None;
        }
        let path = url
            .strip_prefix(SQLITE_PREFIX)
            .or_else(|| url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or(path);
        Some(PathBuf::from(path))
    }
}
