use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vaadinctl_core::IndexConfig;
use vaadinctl_core::index::{DEFAULT_DOWNLOAD_BASE_URL, DEFAULT_INDEX_URL};
use vaadinctl_platform::AppPaths;
use vaadinctl_types::ReleaseType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_index_url")]
    pub index_url: String,

    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub lib_dir: Option<PathBuf>,

    #[serde(default)]
    pub include_channels: Vec<ReleaseType>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_index_url() -> String {
    DEFAULT_INDEX_URL.to_string()
}

fn default_download_base_url() -> String {
    DEFAULT_DOWNLOAD_BASE_URL.to_string()
}

fn default_cache_ttl() -> u64 {
    60 * 60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            download_base_url: default_download_base_url(),
            cache_ttl_secs: default_cache_ttl(),
            connect_timeout_secs: default_connect_timeout(),
            http_timeout_secs: default_http_timeout(),
            lib_dir: None,
            include_channels: Vec::new(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Self {
        Self::load_from_path(&paths.settings_file())
    }

    fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring malformed settings {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            index_url: self.index_url.clone(),
            download_base_url: self.download_base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Channels shown next to stable releases; `overrides` wins when given.
    pub fn channels(&self, overrides: &[ReleaseType]) -> HashSet<ReleaseType> {
        if overrides.is_empty() {
            self.include_channels.iter().copied().collect()
        } else {
            overrides.iter().copied().collect()
        }
    }
}
