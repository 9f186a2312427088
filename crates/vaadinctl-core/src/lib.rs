//! Framework version logic for vaadinctl.
//!
//! This crate holds everything that is independent of the command-line
//! front end:
//! - The version catalog: remote index client, TTL-cached snapshots and
//!   release-channel filtering.
//! - Installed-version resolution from packaged archives.
//! - Consumer-side picker state fed by a background catalog load.
//! - Download of a chosen release's distributable.

pub mod catalog;
pub mod download;
pub mod index;
mod manifest;
pub mod picker;
pub mod resolver;

/// Snapshot cache over a version index, plus release-channel filtering.
pub use catalog::{CatalogService, CatalogSnapshot, DEFAULT_CACHE_TTL, filter_versions};
/// Streaming download of a release distributable.
pub use download::{DownloadError, download_artifact, file_name_from_url};
/// Remote version index seam and its HTTP implementation.
pub use index::{HttpVersionIndex, IndexConfig, VersionIndex, parse_index};
/// Picker state updated by a background catalog load.
pub use picker::{LoadState, PickerError, VersionPicker, spawn_load};
/// Installed framework version lookup in packaged archives.
pub use resolver::{
    LEGACY_ARCHIVE, PRIMARY_ARCHIVE, describe_artifact, resolve_installed, resolve_version,
    scan_archives,
};
