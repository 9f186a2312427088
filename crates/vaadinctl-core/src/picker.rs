use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use thiserror::Error;
use tokio::task::JoinHandle;
use vaadinctl_types::{FetchError, ReleaseType, VersionRecord};

use crate::catalog::{CatalogService, filter_versions};
use crate::index::VersionIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickerError {
    #[error("Please select a version")]
    NothingSelected,
    #[error("Version not available: {version}")]
    UnknownVersion { version: String },
    #[error("Version list is not loaded")]
    NotReady,
}

/// State behind a version chooser: the loaded list, the extra channels the
/// user opted into and the current selection.
#[derive(Debug, Clone)]
pub struct VersionPicker {
    versions: Vec<VersionRecord>,
    allowed: HashSet<ReleaseType>,
    state: LoadState,
    selected: Option<String>,
}

impl Default for VersionPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionPicker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            allowed: HashSet::new(),
            state: LoadState::Loading,
            selected: None,
        }
    }

    #[must_use]
    pub fn with_allowed(allowed: HashSet<ReleaseType>) -> Self {
        Self {
            allowed,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == LoadState::Ready
    }

    #[must_use]
    pub fn allowed(&self) -> &HashSet<ReleaseType> {
        &self.allowed
    }

    /// Change the opted-in channels. A selection hidden by the new filter is
    /// dropped.
    pub fn set_allowed(&mut self, allowed: HashSet<ReleaseType>) {
        self.allowed = allowed;
        if self.selected().is_none() {
            self.selected = None;
        }
    }

    #[must_use]
    pub fn visible(&self) -> Vec<VersionRecord> {
        filter_versions(&self.versions, &self.allowed)
    }

    fn find_visible(&self, name: &str) -> Option<&VersionRecord> {
        self.versions
            .iter()
            .find(|record| record.name == name && record.release_type.is_visible(&self.allowed))
    }

    /// Select a visible version by name.
    ///
    /// # Errors
    /// Fails while the list is not loaded, or when `name` is not visible.
    pub fn select(&mut self, name: &str) -> Result<&VersionRecord, PickerError> {
        if !self.is_ready() {
            return Err(PickerError::NotReady);
        }
        if self.find_visible(name).is_none() {
            return Err(PickerError::UnknownVersion {
                version: name.to_string(),
            });
        }
        self.selected = Some(name.to_string());
        self.selected().ok_or(PickerError::NothingSelected)
    }

    #[must_use]
    pub fn selected(&self) -> Option<&VersionRecord> {
        self.selected
            .as_deref()
            .and_then(|name| self.find_visible(name))
    }

    /// # Errors
    /// Returns [`PickerError::NothingSelected`] when no version is selected.
    pub fn selected_download_url(&self) -> Result<&str, PickerError> {
        self.selected()
            .map(|record| record.download_url.as_str())
            .ok_or(PickerError::NothingSelected)
    }

    fn begin_load(&mut self) {
        self.state = LoadState::Loading;
    }

    fn apply_loaded(&mut self, versions: &[VersionRecord]) {
        self.versions = versions.to_vec();
        self.state = LoadState::Ready;
        if self.selected().is_none() {
            self.selected = None;
        }
    }

    fn apply_failed(&mut self, error: &FetchError) {
        self.state = LoadState::Failed(format!("Version list could not be downloaded: {error}"));
    }
}

fn lock(picker: &Mutex<VersionPicker>) -> std::sync::MutexGuard<'_, VersionPicker> {
    picker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Load the catalog on a background task and publish the outcome into
/// `picker`.
///
/// The picker's lock is taken only to apply the result, never across the
/// fetch. Await the returned handle to observe completion.
pub fn spawn_load<I>(
    service: Arc<CatalogService<I>>,
    picker: Arc<Mutex<VersionPicker>>,
) -> JoinHandle<()>
where
    I: VersionIndex + 'static,
{
    lock(&picker).begin_load();

    tokio::spawn(async move {
        let result = service.get_versions().await;

        let mut guard = lock(&picker);
        match result {
            Ok(snapshot) => {
                debug!("Publishing {} versions to picker", snapshot.versions().len());
                guard.apply_loaded(snapshot.versions());
            }
            Err(error) => {
                warn!("Version list could not be downloaded: {error}");
                guard.apply_failed(&error);
            }
        }
    })
}
