use std::path::PathBuf;

use thiserror::Error;
use vaadinctl_core::{DownloadError, PickerError};
use vaadinctl_platform::AppPathsError;
use vaadinctl_types::FetchError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Version list could not be downloaded: {0}")]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    VersionListUnavailable(String),
    #[error(transparent)]
    Paths(#[from] AppPathsError),
    #[error(transparent)]
    Picker(#[from] PickerError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("{} couldn't be read: {source}", path.display())]
    LibDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No library directory given; pass --lib-dir or set lib_dir in settings")]
    NoLibDir,
    #[error("Download URL has no usable file name: {0}")]
    NoFileName(String),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn lib_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LibDir {
            path: path.into(),
            source,
        }
    }
}
