use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;
use vaadinctl_types::{FetchError, ReleaseType, VersionRecord};

use crate::index::VersionIndex;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// An immutable, timestamped copy of the full version list.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    versions: Vec<VersionRecord>,
    fetched_at: DateTime<Utc>,
    expires_at: Instant,
}

impl CatalogSnapshot {
    fn fresh(versions: Vec<VersionRecord>, ttl: Duration) -> Self {
        Self {
            versions,
            fetched_at: Utc::now(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Rebuild a snapshot taken at `fetched_at`. A timestamp in the future is
    /// not trusted and yields an already-expired snapshot.
    fn restored(versions: Vec<VersionRecord>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = (Utc::now() - fetched_at)
            .to_std()
            .ok()
            .and_then(|age| ttl.checked_sub(age))
            .map_or(now, |remaining| now + remaining);

        Self {
            versions,
            fetched_at,
            expires_at,
        }
    }

    #[must_use]
    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Records whose channel is `release` or one of `allowed`.
///
/// Stable releases are always kept, whatever `allowed` contains.
#[must_use]
pub fn filter_versions(
    versions: &[VersionRecord],
    allowed: &HashSet<ReleaseType>,
) -> Vec<VersionRecord> {
    versions
        .iter()
        .filter(|record| record.release_type.is_visible(allowed))
        .cloned()
        .collect()
}

/// TTL-cached view of a [`VersionIndex`].
///
/// At most one fetch runs at a time per service. Callers arriving while a
/// fetch is in flight wait for it and receive its result.
pub struct CatalogService<I> {
    index: I,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<CatalogSnapshot>>>,
    fetch_gate: Mutex<()>,
}

impl<I: VersionIndex> CatalogService<I> {
    pub fn new(index: I) -> Self {
        Self::with_ttl(index, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(index: I, ttl: Duration) -> Self {
        Self {
            index,
            ttl,
            snapshot: RwLock::new(None),
            fetch_gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Install a previously persisted snapshot. Its remaining lifetime is
    /// derived from `fetched_at`.
    pub fn seed(&self, versions: Vec<VersionRecord>, fetched_at: DateTime<Utc>) {
        let snapshot = CatalogSnapshot::restored(versions, fetched_at, self.ttl);
        debug!(
            "Seeding version catalog with {} cached versions (stale: {})",
            snapshot.versions.len(),
            snapshot.is_stale()
        );
        self.store(Some(Arc::new(snapshot)));
    }

    /// Current snapshot, fresh or stale, without fetching.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<CatalogSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn invalidate(&self) {
        self.store(None);
    }

    fn store(&self, snapshot: Option<Arc<CatalogSnapshot>>) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn fresh_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.cached().filter(|snapshot| !snapshot.is_stale())
    }

    /// Return the cached snapshot, fetching a new one if it is missing or
    /// expired.
    ///
    /// # Errors
    /// Returns the index's [`FetchError`] when a refresh is needed and fails.
    /// The previous snapshot stays cached in that case.
    pub async fn get_versions(&self) -> Result<Arc<CatalogSnapshot>, FetchError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let _gate = self.fetch_gate.lock().await;
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("Version catalog refreshed by a concurrent caller");
            return Ok(snapshot);
        }

        debug!("Version catalog empty or expired, fetching");
        let versions = self.index.fetch().await.inspect_err(|error| {
            warn!("Version list could not be downloaded: {error}");
        })?;

        let snapshot = Arc::new(CatalogSnapshot::fresh(versions, self.ttl));
        self.store(Some(Arc::clone(&snapshot)));
        info!(
            "Version catalog refreshed with {} versions",
            snapshot.versions.len()
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use vaadinctl_types::{FetchError, ReleaseType, VersionRecord};

    use super::{CatalogService, filter_versions};
    use crate::index::VersionIndex;

    fn record(name: &str, release_type: ReleaseType) -> VersionRecord {
        VersionRecord::new(name, release_type, format!("https://dl.test/{name}.zip"))
    }

    fn sample() -> Vec<VersionRecord> {
        vec![
            record("7.1.0", ReleaseType::Release),
            record("7.2.0.beta1", ReleaseType::Prerelease),
            record("7.2-SNAPSHOT", ReleaseType::Nightly),
            record("7.0.7", ReleaseType::Release),
        ]
    }

    /// Hands out scripted results, then the sample list, counting every call.
    struct ScriptedIndex {
        calls: AtomicUsize,
        script: std::sync::Mutex<VecDeque<Result<Vec<VersionRecord>, FetchError>>>,
        delay: Duration,
    }

    impl ScriptedIndex {
        fn new(script: Vec<Result<Vec<VersionRecord>, FetchError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: std::sync::Mutex::new(script.into()),
                delay: Duration::from_millis(50),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VersionIndex for ScriptedIndex {
        async fn fetch(&self) -> Result<Vec<VersionRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Ok(sample()))
        }
    }

    #[test]
    fn filter_with_empty_set_keeps_only_releases() {
        let versions = sample();

        let filtered = filter_versions(&versions, &HashSet::new());

        let names: Vec<_> = filtered.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["7.1.0", "7.0.7"]);
        assert!(
            filtered
                .iter()
                .all(|r| r.release_type == ReleaseType::Release)
        );
    }

    #[test]
    fn filter_always_includes_releases_and_preserves_order() {
        let versions = sample();
        let allowed = HashSet::from([ReleaseType::Nightly]);

        let filtered = filter_versions(&versions, &allowed);

        let names: Vec<_> = filtered.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["7.1.0", "7.2-SNAPSHOT", "7.0.7"]);
        assert_eq!(versions.len(), 4, "source list must not be touched");
    }

    #[test]
    fn filter_with_all_channels_returns_everything() {
        let versions = sample();
        let allowed = HashSet::from(ReleaseType::ALL);

        assert_eq!(filter_versions(&versions, &allowed), versions);
    }

    #[tokio::test(start_paused = true)]
    async fn get_versions_within_ttl_reuses_snapshot() {
        let service = CatalogService::new(ScriptedIndex::new(vec![]));

        let first = service.get_versions().await.unwrap();
        let second = service.get_versions().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.versions(), second.versions());
        assert_eq!(service.index().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_snapshot_is_fetched_once_for_concurrent_callers() {
        let ttl = Duration::from_secs(60);
        let service = CatalogService::with_ttl(ScriptedIndex::new(vec![]), ttl);
        let initial = service.get_versions().await.unwrap();

        tokio::time::advance(ttl + Duration::from_secs(1)).await;
        assert!(initial.is_stale());

        let results =
            futures_util::future::join_all((0..8).map(|_| service.get_versions())).await;

        assert_eq!(service.index().calls(), 2);
        let snapshots: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
        assert!(!Arc::ptr_eq(&snapshots[0], &initial));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_snapshot() {
        let ttl = Duration::from_secs(60);
        let service = CatalogService::with_ttl(
            ScriptedIndex::new(vec![
                Ok(sample()),
                Err(FetchError::request("connection reset")),
            ]),
            ttl,
        );
        let initial = service.get_versions().await.unwrap();
        tokio::time::advance(ttl).await;

        let result = service.get_versions().await;

        assert_eq!(result.unwrap_err(), FetchError::request("connection reset"));
        let cached = service.cached().expect("previous snapshot should survive");
        assert!(Arc::ptr_eq(&cached, &initial));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_after_initial_failure_returns_fresh_snapshot() {
        let service = CatalogService::new(ScriptedIndex::new(vec![Err(FetchError::Timeout {
            seconds: 10,
        })]));

        let first = service.get_versions().await;
        assert!(matches!(first, Err(FetchError::Timeout { seconds: 10 })));
        assert!(service.cached().is_none());

        let second = service.get_versions().await.unwrap();
        assert_eq!(second.versions(), sample().as_slice());
        assert_eq!(service.index().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_snapshot_is_served_until_it_expires() {
        let service = CatalogService::with_ttl(
            ScriptedIndex::new(vec![]),
            Duration::from_secs(3600),
        );
        let cached = vec![record("6.8.12", ReleaseType::Release)];
        service.seed(cached.clone(), Utc::now() - chrono::Duration::minutes(10));

        let snapshot = service.get_versions().await.unwrap();
        assert_eq!(snapshot.versions(), cached.as_slice());
        assert_eq!(service.index().calls(), 0);

        tokio::time::advance(Duration::from_secs(50 * 60)).await;
        let refreshed = service.get_versions().await.unwrap();
        assert_eq!(refreshed.versions(), sample().as_slice());
        assert_eq!(service.index().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_snapshot_older_than_ttl_triggers_fetch() {
        let service = CatalogService::with_ttl(
            ScriptedIndex::new(vec![]),
            Duration::from_secs(3600),
        );
        service.seed(
            vec![record("6.8.12", ReleaseType::Release)],
            Utc::now() - chrono::Duration::hours(2),
        );

        assert!(service.cached().is_some_and(|s| s.is_stale()));
        service.get_versions().await.unwrap();
        assert_eq!(service.index().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_snapshot_from_the_future_is_stale() {
        let service = CatalogService::new(ScriptedIndex::new(vec![]));
        service.seed(sample(), Utc::now() + chrono::Duration::hours(1));

        assert!(service.cached().is_some_and(|s| s.is_stale()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_next_fetch() {
        let service = CatalogService::new(ScriptedIndex::new(vec![]));
        service.get_versions().await.unwrap();

        service.invalidate();
        assert!(service.cached().is_none());

        service.get_versions().await.unwrap();
        assert_eq!(service.index().calls(), 2);
    }
}
