use std::fs;

use serde::Deserialize;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lookups: LookupPaths,
    pub output: OutputConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Paths to the three read-only lookup maps.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupPaths {
    pub gender_map: String,
    pub campus_map: String,
    pub city_map: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Base directory for the cities/, chamadas/ and full-dump views.
    pub directory: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Staged batches older than this are reaped by the sweep.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Target table for the upsert. Credentials come from the environment.
    #[serde(default = "default_remote_table")]
    pub table: String,
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            table: default_remote_table(),
            timeout_seconds: default_remote_timeout(),
        }
    }
}

fn default_ttl_minutes() -> u32 {
    60
}

fn default_remote_table() -> String {
    "master_calouros".to_string()
}

fn default_remote_timeout() -> u64 {
    20
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read config file '{}': {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
