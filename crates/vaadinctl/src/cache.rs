use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vaadinctl_core::CatalogSnapshot;
use vaadinctl_platform::AppPaths;
use vaadinctl_types::VersionRecord;

/// Last fetched version list, kept between runs.
#[derive(Serialize, Deserialize)]
pub struct DiskCache {
    pub versions: Vec<VersionRecord>,
    pub cached_at: DateTime<Utc>,
}

impl DiskCache {
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        Self {
            versions: snapshot.versions().to_vec(),
            cached_at: snapshot.fetched_at(),
        }
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        let data = serde_json::to_vec(self)?;
        write_atomic(path, &data)
    }

    pub fn load(paths: &AppPaths) -> Option<Self> {
        Self::load_from_path(&paths.version_cache_file())
    }

    pub fn save(&self, paths: &AppPaths) {
        if let Err(error) = paths
            .ensure_dirs()
            .and_then(|()| self.save_to_path(&paths.version_cache_file()))
        {
            log::warn!("Failed to write version cache: {error}");
        }
    }
}

/// Write `data` through a sibling temp file that is renamed over `path`. The
/// temp file is removed if anything fails before the rename.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "cache path has no parent")
    })?;
    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("cache");

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
