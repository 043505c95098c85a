use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tether_core::{RemoteServiceSpec, StaticCatalog};
use thiserror::Error;

use crate::monitor::MonitorConfig;

const MIN_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    Missing(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub lookup_timeout_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            probe_timeout_ms: 2000,
            lookup_timeout_ms: 2000,
        }
    }
}

/// Client-side configuration: which remote services to bind and how
/// often to check them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default, rename = "remote")]
    pub remotes: Vec<RemoteServiceSpec>,
    #[serde(default)]
    pub catalog: BTreeMap<String, Vec<String>>,
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn catalog(&self) -> StaticCatalog {
        self.catalog.clone().into_iter().collect()
    }

    /// Monitor timings. The interval never drops below one second and the
    /// timeouts never below 100ms.
    pub fn monitor_config(&self) -> MonitorConfig {
        let settings = &self.monitor;
        MonitorConfig {
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms.max(MIN_TIMEOUT_MS)),
            lookup_timeout: Duration::from_millis(settings.lookup_timeout_ms.max(MIN_TIMEOUT_MS)),
        }
    }
}
