//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `MEMORY_DATA_PATH` and
//! `KGRAPH_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::memory::MemoryConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub log_level: String,
    pub memory: MemoryConfig,
}

/// Raw TOML shape, deserialised before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    service: RawService,
    memory: RawMemory,
}

#[derive(Deserialize)]
struct RawService {
    #[serde(default = "default_service_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawService {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
struct RawMemory {
    /// Directory holding one `memory_{hash}.json` file per user.
    data_dir: String,
}

fn default_service_name() -> String {
    "kgraph-memory".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load config from `path`, then apply env-var overrides.
pub fn load(path: &Path) -> Result<Config, AppError> {
    let data_dir_override = env::var("MEMORY_DATA_PATH").ok();
    let log_level_override = env::var("KGRAPH_LOG_LEVEL").ok();
    load_from(path, data_dir_override.as_deref(), log_level_override.as_deref())
}

/// Loader with explicit overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    data_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let data_dir_str = data_dir_override.unwrap_or(&parsed.memory.data_dir);
    if data_dir_str.trim().is_empty() {
        return Err(AppError::Config("[memory].data_dir must not be empty".into()));
    }

    Ok(Config {
        service_name: parsed.service.name,
        log_level: log_level_override
            .unwrap_or(&parsed.service.log_level)
            .to_string(),
        memory: MemoryConfig {
            data_dir: expand_home(data_dir_str),
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
