//! User-facing blocking settings
//!
//! Settings arrive as camelCase JSON from the host and are normalized once per
//! change; the request path only ever sees [`BlockingSettings`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::origin::normalize_domain;
use crate::types::ResourceType;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("blocking level {0} is out of range (expected 0, 1 or 2)")]
    InvalidLevel(u8),
}

/// How aggressively list-based blocking applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BlockingLevel {
    Off = 0,
    /// Only third-party requests are checked against the lists
    #[default]
    ThirdParty = 1,
    All = 2,
}

impl TryFrom<u8> for BlockingLevel {
    type Error = SettingsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::ThirdParty),
            2 => Ok(Self::All),
            other => Err(SettingsError::InvalidLevel(other)),
        }
    }
}

/// Settings exactly as the host stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSettings {
    pub blocking_level: u8,
    pub content_types: Vec<String>,
    pub exception_domains: Vec<String>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            blocking_level: BlockingLevel::default() as u8,
            content_types: Vec::new(),
            exception_domains: Vec::new(),
        }
    }
}

/// Normalized settings, replaced wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockingSettings {
    pub blocking_level: BlockingLevel,
    /// Resource types blocked outright, regardless of lists
    pub content_types: HashSet<ResourceType>,
    /// Lower-cased, `www.`-stripped initiating domains exempt from list blocking
    pub exception_domains: HashSet<String>,
}

impl BlockingSettings {
    pub fn from_raw(raw: &RawSettings) -> Result<Self, SettingsError> {
        let blocking_level = BlockingLevel::try_from(raw.blocking_level)?;

        let mut content_types = HashSet::new();
        for name in &raw.content_types {
            match name.parse::<ResourceType>() {
                Ok(ty) => {
                    content_types.insert(ty);
                }
                Err(err) => log::warn!("ignoring content type setting: {err}"),
            }
        }

        let exception_domains = raw
            .exception_domains
            .iter()
            .map(|domain| normalize_domain(domain).into_owned())
            .filter(|domain| !domain.is_empty())
            .collect();

        Ok(Self {
            blocking_level,
            content_types,
            exception_domains,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let raw: RawSettings = serde_json::from_str(json)?;
        Self::from_raw(&raw)
    }

    /// Whether requests initiated from `domain` skip list blocking.
    pub fn is_exception_domain(&self, domain: &str) -> bool {
        !self.exception_domains.is_empty()
            && self.exception_domains.contains(normalize_domain(domain).as_ref())
    }
}
