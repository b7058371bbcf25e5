use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sieve_core::RawSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Filter lists, loaded in order. Missing files are skipped.
    pub filter_lists: Vec<PathBuf>,
    /// The user's own filter rules.
    pub custom_filters: Option<PathBuf>,
    /// Where the blocked-request count is persisted.
    pub count_store: Option<PathBuf>,
    pub flush_interval_secs: u64,
    pub extra_tracking_params: Vec<String>,
    /// Host name to extra tracking parameters for that host.
    pub extra_site_tracking_params: HashMap<String, Vec<String>>,
    /// Settings in effect until the host pushes its own.
    pub settings: RawSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter_lists: Vec::new(),
            custom_filters: None,
            count_store: None,
            flush_interval_secs: 60,
            extra_tracking_params: Vec::new(),
            extra_site_tracking_params: HashMap::new(),
            settings: RawSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Every list file to load: the configured lists, then the custom filters.
    pub fn list_paths(&self) -> Vec<PathBuf> {
        self.filter_lists
            .iter()
            .cloned()
            .chain(self.custom_filters.clone())
            .collect()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}
