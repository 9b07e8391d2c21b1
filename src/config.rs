use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://hn.algolia.com/api/v1";
pub const DEFAULT_QUERY: &str = "redux";
pub const DEFAULT_HITS_PER_PAGE: u32 = 100;

/// How responses for the same term are merged when they arrive out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrdering {
    /// Append each page as its response arrives.
    #[default]
    Arrival,
    /// Hold pages back until every earlier page has been appended.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub hits_per_page: u32,
    pub default_query: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub page_ordering: PageOrdering,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            hits_per_page: DEFAULT_HITS_PER_PAGE,
            default_query: DEFAULT_QUERY.to_string(),
            request_timeout_secs: 60,
            log_level: "info".to_string(),
            page_ordering: PageOrdering::Arrival,
        }
    }
}

impl AppConfig {
    /// `~/.hn_search/config.toml`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".hn_search").join("config.toml"))
    }

    /// Reads the config file at `path`. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}
