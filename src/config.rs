use anyhow::{Context, Result};
use benchkeep_core::{DistinctPolicy, DocumentFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Encoding of the persisted document; guessed from the extension when unset.
    #[serde(default)]
    pub format: Option<DocumentFormat>,
}

impl StoreConfig {
    pub fn format(&self) -> DocumentFormat {
        self.format
            .unwrap_or_else(|| DocumentFormat::from_path(&self.path))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_tool_group")]
    pub tool_group: String,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default)]
    pub distinct: DistinctPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tool_group: default_tool_group(),
            tool: default_tool(),
            distinct: DistinctPolicy::default(),
        }
    }
}

fn default_tool_group() -> String {
    "Benchmark".to_string()
}

fn default_tool() -> String {
    "customSmallerIsBetter".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("dev/bench/data.js")
}

impl Config {
    /// Defaults used when no configuration file exists.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: default_store_path(),
                format: None,
            },
            repository: RepositoryConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.path.as_os_str().is_empty() {
        anyhow::bail!("store.path must not be empty");
    }

    if config.repository.url.trim().is_empty() {
        anyhow::bail!("repository.url must be set");
    }

    if config.ingest.tool_group.trim().is_empty() {
        anyhow::bail!("ingest.tool_group must not be empty");
    }

    if config.ingest.tool.trim().is_empty() {
        anyhow::bail!("ingest.tool must not be empty");
    }

    Ok(config)
}

/// Load the config file, falling back to [`Config::minimal`] when it does
/// not exist. A file that exists but fails validation is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}
