use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use vaadinctl_core::{
    CatalogService, HttpVersionIndex, LoadState, VersionPicker, download_artifact,
    file_name_from_url, resolve_installed, scan_archives, spawn_load,
};
use vaadinctl_platform::AppPaths;
use vaadinctl_types::{FrameworkVersion, InstalledVersion, ReleaseType, VersionRecord};

use crate::cache::DiskCache;
use crate::error::AppError;
use crate::settings::Settings;

/// Everything a command needs from start-up.
pub struct Context {
    pub paths: AppPaths,
    pub settings: Settings,
}

impl Context {
    fn lib_dir(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.settings.lib_dir.clone())
    }
}

struct Catalog {
    service: Arc<CatalogService<HttpVersionIndex>>,
    seeded_at: Option<DateTime<Utc>>,
}

fn open_catalog(ctx: &Context, refresh: bool) -> Result<Catalog, AppError> {
    let index = HttpVersionIndex::new(ctx.settings.index_config())?;
    let service = CatalogService::with_ttl(index, ctx.settings.cache_ttl());

    let mut seeded_at = None;
    if refresh {
        debug!("Skipping version cache, refresh requested");
    } else if let Some(cache) = DiskCache::load(&ctx.paths) {
        seeded_at = Some(cache.cached_at);
        service.seed(cache.versions, cache.cached_at);
    }

    Ok(Catalog {
        service: Arc::new(service),
        seeded_at,
    })
}

impl Catalog {
    /// Run a background load into a fresh picker and hand back its final
    /// state.
    async fn load_picker(&self, allowed: HashSet<ReleaseType>) -> Result<VersionPicker, AppError> {
        let picker = Arc::new(Mutex::new(VersionPicker::with_allowed(allowed)));
        spawn_load(Arc::clone(&self.service), Arc::clone(&picker)).await?;

        let picker = picker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let LoadState::Failed(message) = picker.state() {
            return Err(AppError::VersionListUnavailable(message.clone()));
        }
        Ok(picker)
    }

    fn persist(&self, paths: &AppPaths) {
        let Some(snapshot) = self.service.cached() else {
            return;
        };
        if Some(snapshot.fetched_at()) == self.seeded_at {
            return;
        }
        debug!("Writing {} versions to cache", snapshot.versions().len());
        DiskCache::from_snapshot(&snapshot).save(paths);
    }
}

/// Archives to inspect: the explicit list when given, otherwise every jar in
/// `lib_dir`.
fn collect_candidates(
    archives: Vec<PathBuf>,
    lib_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, AppError> {
    if !archives.is_empty() {
        return Ok(archives);
    }
    let dir = lib_dir.ok_or(AppError::NoLibDir)?;
    scan_archives(dir).map_err(|source| AppError::lib_dir(dir, source))
}

async fn resolve_candidates(candidates: Vec<PathBuf>) -> Result<InstalledVersion, AppError> {
    Ok(tokio::task::spawn_blocking(move || resolve_installed(&candidates)).await?)
}

fn is_installed(record: &VersionRecord, installed: &InstalledVersion) -> bool {
    let Some(raw) = installed.as_known() else {
        return false;
    };
    match (
        installed.parsed(),
        record.name.parse::<FrameworkVersion>(),
    ) {
        (Some(Ok(ours)), Ok(theirs)) => ours == theirs,
        _ => record.name == raw,
    }
}

fn format_rows(records: &[VersionRecord], installed: &InstalledVersion) -> Vec<String> {
    let name_width = records
        .iter()
        .map(|record| record.name.len())
        .max()
        .unwrap_or(0);

    records
        .iter()
        .map(|record| {
            let marker = if is_installed(record, installed) {
                '*'
            } else {
                ' '
            };
            format!(
                "{marker} {:<name_width$}  {:<10}  {}",
                record.name, record.release_type, record.download_url
            )
        })
        .collect()
}

/// Installed version shown next to the list. The library directory only
/// adds context, so a directory that cannot be read is logged and treated as
/// unknown.
async fn installed_for_listing(lib_dir: Option<PathBuf>) -> Result<InstalledVersion, AppError> {
    let Some(dir) = lib_dir else {
        return Ok(InstalledVersion::Unknown);
    };
    match collect_candidates(Vec::new(), Some(dir.as_path())) {
        Ok(candidates) => resolve_candidates(candidates).await,
        Err(error) => {
            warn!("{error}");
            Ok(InstalledVersion::Unknown)
        }
    }
}

async fn list_rows(
    ctx: &Context,
    include: &[ReleaseType],
    refresh: bool,
    lib_dir: Option<PathBuf>,
) -> Result<Vec<String>, AppError> {
    let catalog = open_catalog(ctx, refresh)?;
    let picker = catalog
        .load_picker(ctx.settings.channels(include))
        .await?;
    catalog.persist(&ctx.paths);

    let installed = installed_for_listing(ctx.lib_dir(lib_dir)).await?;
    Ok(format_rows(&picker.visible(), &installed))
}

pub async fn list(
    ctx: &Context,
    include: &[ReleaseType],
    refresh: bool,
    lib_dir: Option<PathBuf>,
) -> Result<(), AppError> {
    for row in list_rows(ctx, include, refresh, lib_dir).await? {
        println!("{row}");
    }
    Ok(())
}

pub async fn installed(
    ctx: &Context,
    lib_dir: Option<PathBuf>,
    archives: Vec<PathBuf>,
) -> Result<(), AppError> {
    let lib_dir = ctx.lib_dir(lib_dir);
    let candidates = collect_candidates(archives, lib_dir.as_deref())?;
    debug!("Inspecting {} candidate archives", candidates.len());

    let installed = resolve_candidates(candidates).await?;
    println!("{installed}");
    Ok(())
}

pub async fn download(
    ctx: &Context,
    version: &str,
    dir: Option<PathBuf>,
    include: &[ReleaseType],
    refresh: bool,
) -> Result<(), AppError> {
    let catalog = open_catalog(ctx, refresh)?;
    let mut picker = catalog
        .load_picker(ctx.settings.channels(include))
        .await?;
    catalog.persist(&ctx.paths);

    picker.select(version)?;
    let url = picker.selected_download_url()?;
    let file_name =
        file_name_from_url(url).ok_or_else(|| AppError::NoFileName(url.to_string()))?;
    let target_dir = dir.unwrap_or_else(|| ctx.paths.downloads_dir());

    let path = download_artifact(
        catalog.service.index().client(),
        url,
        &target_dir,
        file_name,
    )
    .await?;

    info!("Downloaded {version} to {}", path.display());
    println!("{}", path.display());
    Ok(())
}
