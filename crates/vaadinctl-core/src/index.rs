use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use serde::Deserialize;
use vaadinctl_types::{FetchError, FrameworkVersion, ReleaseType, VersionRecord};

pub const DEFAULT_INDEX_URL: &str = "https://vaadin.com/download/VERSIONS.json";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://vaadin.com/download/";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DISTRIBUTION_PREFIX: &str = "vaadin-all";

/// Source of the list of published framework releases.
#[async_trait]
pub trait VersionIndex: Send + Sync {
    async fn fetch(&self) -> Result<Vec<VersionRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub index_url: String,
    pub download_base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    name: String,
    release_type: String,
    #[serde(default)]
    download_url: Option<String>,
}

pub struct HttpVersionIndex {
    client: reqwest::Client,
    config: IndexConfig,
}

impl HttpVersionIndex {
    /// Build an index client with the configured timeouts.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: IndexConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(format!("vaadinctl/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| FetchError::ClientBuild {
                details: error.to_string(),
            })?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn map_request_error(&self, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            self.timeout_error(error.is_connect())
        } else {
            FetchError::request_from(error)
        }
    }

    /// A timeout hit before the connection was up is reported against the
    /// connect limit, anything later against the whole-request limit.
    fn timeout_error(&self, while_connecting: bool) -> FetchError {
        let limit = if while_connecting {
            self.config.connect_timeout
        } else {
            self.config.request_timeout
        };
        FetchError::Timeout {
            seconds: limit.as_secs(),
        }
    }
}

#[async_trait]
impl VersionIndex for HttpVersionIndex {
    async fn fetch(&self) -> Result<Vec<VersionRecord>, FetchError> {
        debug!("Fetching version index from {}", self.config.index_url);

        let response = self
            .client
            .get(&self.config.index_url)
            .send()
            .await
            .map_err(|error| self.map_request_error(&error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body_snippet,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| self.map_request_error(&error))?;

        parse_index(
            &body,
            &self.config.index_url,
            &self.config.download_base_url,
        )
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.trim().chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

/// Parse a version index document into records, resolving each download
/// location.
///
/// Entries with an unknown release type or an unresolvable location are
/// skipped. A repeated name keeps its first occurrence.
///
/// # Errors
/// Returns a parse error when the body is not a JSON array of entries or
/// when `index_url` is not a valid URL.
pub fn parse_index(
    body: &str,
    index_url: &str,
    download_base_url: &str,
) -> Result<Vec<VersionRecord>, FetchError> {
    let entries: Vec<RawEntry> = serde_json::from_str(body).map_err(FetchError::parse_from)?;
    let index_url = Url::parse(index_url).map_err(FetchError::parse_from)?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let Ok(release_type) = entry.release_type.parse::<ReleaseType>() else {
            warn!(
                "Skipping version {} with unknown release type {}",
                entry.name, entry.release_type
            );
            continue;
        };

        let name = entry.name.trim().to_string();
        if name.is_empty() || !seen.insert(name.clone()) {
            debug!("Skipping empty or duplicate version entry {name:?}");
            continue;
        }

        let download_url = match entry.download_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => index_url.join(url).map(String::from).ok(),
            _ => derive_download_url(download_base_url, release_type, &name),
        };
        let Some(download_url) = download_url else {
            warn!("Skipping version {name}: download location could not be resolved");
            continue;
        };

        records.push(VersionRecord {
            name,
            release_type,
            download_url,
        });
    }

    Ok(records)
}

/// `<base>/<channel>/<major.minor>/<name>/vaadin-all-<name>.zip`
fn derive_download_url(base: &str, release_type: ReleaseType, name: &str) -> Option<String> {
    let version: FrameworkVersion = name.parse().ok()?;
    let base = base.trim_end_matches('/');
    Some(format!(
        "{base}/{release_type}/{}/{name}/{DISTRIBUTION_PREFIX}-{name}.zip",
        version.minor_line()
    ))
}
