//! Configuration loading and validation

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use permscope_permissions::{IndexOptions, ScopeResolverConfig};

/// Complete permscope configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PermscopeConfig {
    #[serde(default)]
    pub dataset: DatasetSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetSection {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_permissions_path")]
    pub permissions_path: String,
    #[serde(default)]
    pub descriptions_path: Option<String>,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            permissions_path: default_permissions_path(),
            descriptions_path: None,
            default_locale: default_locale(),
            ignore_case: false,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_root() -> PathBuf { PathBuf::from("./data") }
fn default_permissions_path() -> String { "permissions.json".to_string() }
fn default_locale() -> String { "en-US".to_string() }
fn default_ttl_secs() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }

impl PermscopeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PermscopeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.dataset.permissions_path.trim().is_empty() {
            bail!("dataset.permissions_path cannot be empty");
        }
        if let Some(path) = &self.dataset.descriptions_path {
            if path.trim().is_empty() {
                bail!("dataset.descriptions_path cannot be empty when set");
            }
        }
        if self.dataset.default_locale.trim().is_empty() {
            bail!("dataset.default_locale cannot be empty");
        }
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than 0");
        }
        Ok(())
    }

    /// Resolver settings derived from this configuration
    pub fn resolver_config(&self) -> ScopeResolverConfig {
        ScopeResolverConfig {
            permissions_path: self.dataset.permissions_path.clone(),
            descriptions_path: self.dataset.descriptions_path.clone(),
            default_locale: self.dataset.default_locale.clone(),
            ttl: Duration::from_secs(self.cache.ttl_secs),
            index_options: IndexOptions {
                ignore_case: self.dataset.ignore_case,
            },
        }
    }
}
