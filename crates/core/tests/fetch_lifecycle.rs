//! Fetch lifecycle integration tests.
//!
//! These tests drive the orchestrator against an on-disk store and mock
//! upstreams through a module's life:
//! published -> fetched -> refetched -> retracted -> removed

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use modfetch_core::{
    latest::LatestModuleVersions,
    store::{
        ModuleLock, ModuleVersionState, ModuleVersionStateUpdate, PackageVersionState,
        SearchDocument, VersionMapEntry,
    },
    testing::{fixtures, MockModuleFetcher, MockOrigin, RecordingReporter},
    AdmissionController, FetchConfig, Fetcher, InMemoryQueue, MemoryCache, Module, Queue,
    ScheduleOptions, SqliteStore, Status, Store, StoreError,
};

/// Test helper wiring a Fetcher to mocks and a temporary database.
struct TestHarness {
    origin: Arc<MockOrigin>,
    module_fetcher: Arc<MockModuleFetcher>,
    store: Arc<SqliteStore>,
    reporter: Arc<RecordingReporter>,
    fetcher: Fetcher,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteStore::new(&temp_dir.path().join("test.db")).expect("Failed to create store"),
        );
        Self::with_store(store.clone(), store, temp_dir)
    }

    fn with_store(store: Arc<SqliteStore>, wired: Arc<dyn Store>, temp_dir: TempDir) -> Self {
        let origin = Arc::new(MockOrigin::new());
        let module_fetcher = Arc::new(MockModuleFetcher::new());
        let reporter = Arc::new(RecordingReporter::new());
        let fetcher = Fetcher::new(
            FetchConfig::default(),
            origin.clone(),
            module_fetcher.clone(),
            wired,
            AdmissionController::new(u64::MAX),
        )
        .with_cache(Arc::new(MemoryCache::new()))
        .with_reporter(reporter.clone());

        Self {
            origin,
            module_fetcher,
            store,
            reporter,
            fetcher,
            _temp_dir: temp_dir,
        }
    }

    async fn publish(&self, path: &str, version: &str, mod_file: &str) {
        self.origin.add_version(path, version, mod_file).await;
        self.module_fetcher
            .add_module(fixtures::module(path, version))
            .await;
    }

    async fn state(&self, path: &str, version: &str) -> ModuleVersionState {
        self.store
            .get_module_version_state(path, version)
            .await
            .expect("Failed to read state")
            .expect("State missing")
    }
}

#[tokio::test]
async fn test_fetch_then_module_disappears() {
    let h = TestHarness::new();
    h.publish("example.com/mod", "v1.0.0", "module example.com/mod\n")
        .await;

    let outcome = h
        .fetcher
        .fetch_and_update_state("example.com/mod", "v1.0.0")
        .await;
    assert_eq!(outcome.status, Status::Success);
    assert_eq!(h.state("example.com/mod", "v1.0.0").await.num_packages, Some(1));

    // Taken down upstream.
    h.origin.remove_module("example.com/mod").await;
    h.module_fetcher.remove_module("example.com/mod").await;

    let outcome = h
        .fetcher
        .fetch_and_update_state("example.com/mod", "v1.0.0")
        .await;
    assert_eq!(outcome.status, Status::NotFound);

    assert!(h
        .store
        .get_module("example.com/mod", "v1.0.0")
        .await
        .unwrap()
        .is_none());
    assert!(h
        .store
        .search_documents_for("example.com/mod")
        .await
        .unwrap()
        .is_empty());

    let state = h.state("example.com/mod", "v1.0.0").await;
    assert_eq!(state.status, Status::NotFound);
    assert_eq!(state.try_count, 2);
    assert!(state.next_processed_after.is_none());

    let latest = h
        .store
        .get_latest_module_versions("example.com/mod")
        .await
        .unwrap()
        .unwrap();
    assert!(!latest.is_found());
    assert!(h.reporter.reports().is_empty());
}

#[tokio::test]
async fn test_refetch_is_idempotent() {
    let h = TestHarness::new();
    h.publish("example.com/mod", "v1.0.0", "module example.com/mod\n")
        .await;

    for _ in 0..2 {
        let outcome = h
            .fetcher
            .fetch_and_update_state("example.com/mod", "v1.0.0")
            .await;
        assert_eq!(outcome.status, Status::Success);
    }

    let state = h.state("example.com/mod", "v1.0.0").await;
    assert_eq!(state.try_count, 2);
    assert_eq!(
        h.store
            .search_documents_for("example.com/mod")
            .await
            .unwrap()
            .len(),
        1
    );
    let packages = h
        .store
        .get_package_version_states("example.com/mod", "v1.0.0")
        .await
        .unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(h.module_fetcher.fetch_count().await, 2);
}

#[tokio::test]
async fn test_retracted_version_is_not_good() {
    let h = TestHarness::new();
    h.publish("example.com/mod", "v1.0.0", "module example.com/mod\n")
        .await;
    h.publish(
        "example.com/mod",
        "v1.1.0",
        "module example.com/mod\n\n// Leaked credentials.\nretract v1.1.0\n",
    )
    .await;

    let outcome = h
        .fetcher
        .fetch_and_update_state("example.com/mod", "v1.1.0")
        .await;
    assert_eq!(outcome.status, Status::Success);

    let stored = h
        .store
        .get_module("example.com/mod", "v1.1.0")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.info.retracted);
    assert_eq!(
        stored.info.retraction_rationale.as_deref(),
        Some("Leaked credentials.")
    );

    let latest = h
        .store
        .get_latest_module_versions("example.com/mod")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.raw_version.as_deref(), Some("v1.1.0"));
    assert_eq!(latest.cooked_version.as_deref(), Some("v1.0.0"));
    assert!(latest.good_version.is_none());

    h.fetcher
        .fetch_and_update_state("example.com/mod", "v1.0.0")
        .await;
    let latest = h
        .store
        .get_latest_module_versions("example.com/mod")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.good_version.as_deref(), Some("v1.0.0"));
}

#[tokio::test]
async fn test_sibling_versions_fetched_concurrently() {
    let h = TestHarness::new();
    h.publish("example.com/mod", "v1.0.0", "module example.com/mod\n")
        .await;
    h.publish("example.com/mod", "v1.1.0", "module example.com/mod\n")
        .await;
    h.module_fetcher
        .set_delay(Duration::from_millis(20))
        .await;

    let (older, newer) = tokio::join!(
        h.fetcher.fetch_and_update_state("example.com/mod", "v1.0.0"),
        h.fetcher.fetch_and_update_state("example.com/mod", "v1.1.0"),
    );
    assert_eq!(older.status, Status::Success);
    assert_eq!(newer.status, Status::Success);

    let latest = h
        .store
        .get_latest_module_versions("example.com/mod")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.good_version.as_deref(), Some("v1.1.0"));

    let docs = h
        .store
        .search_documents_for("example.com/mod")
        .await
        .unwrap();
    assert!(!docs.is_empty());
    assert!(docs.iter().all(|d| d.version == "v1.1.0"));
    assert!(h.reporter.reports().is_empty());
}

#[tokio::test]
async fn test_queue_timeout_releases_admission() {
    let origin = Arc::new(MockOrigin::new());
    let module_fetcher = Arc::new(MockModuleFetcher::new());
    origin
        .add_version("example.com/slow", "v1.0.0", "module example.com/slow\n")
        .await;
    module_fetcher
        .add_module(fixtures::module("example.com/slow", "v1.0.0"))
        .await;
    module_fetcher.set_cost("example.com/slow", "v1.0.0", 64).await;
    module_fetcher.set_delay(Duration::from_millis(500)).await;

    let store = Arc::new(SqliteStore::in_memory().expect("Failed to create store"));
    let fetcher = Arc::new(Fetcher::new(
        FetchConfig::default(),
        origin,
        module_fetcher.clone(),
        store.clone(),
        AdmissionController::new(1024),
    ));
    let queue = InMemoryQueue::new(fetcher.clone(), 1, 4, Duration::from_millis(50));

    assert!(queue
        .schedule_fetch("example.com/slow", "v1.0.0", &ScheduleOptions::default())
        .await
        .unwrap());
    queue.drain().await;

    assert_eq!(module_fetcher.fetch_count().await, 1);
    assert_eq!(fetcher.admission().stats().reserved, 0);
    assert!(store
        .get_module_version_state("example.com/slow", "v1.0.0")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_floating_pointer_gets_version_map_row() {
    let h = TestHarness::new();
    h.publish("example.com/mod", "v1.2.0", "module example.com/mod\n")
        .await;
    h.origin.set_alias("example.com/mod", "main", "v1.2.0").await;

    let outcome = h
        .fetcher
        .fetch_and_update_state("example.com/mod", "v1.2.0")
        .await;
    assert_eq!(outcome.status, Status::Success);

    let main = h
        .store
        .get_version_map("example.com/mod", "main")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(main.resolved_version.as_deref(), Some("v1.2.0"));
    assert_eq!(main.status, Status::Success);
}

/// Store that fails every version-map write and delegates the rest.
struct FailingVersionMapStore {
    inner: Arc<SqliteStore>,
}

#[async_trait]
impl Store for FailingVersionMapStore {
    async fn lock_module(&self, module_path: &str) -> ModuleLock {
        self.inner.lock_module(module_path).await
    }

    async fn insert_module(&self, module: &Module) -> Result<bool, StoreError> {
        self.inner.insert_module(module).await
    }

    async fn get_module(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<Module>, StoreError> {
        self.inner.get_module(module_path, version).await
    }

    async fn delete_module(&self, module_path: &str, version: &str) -> Result<(), StoreError> {
        self.inner.delete_module(module_path, version).await
    }

    async fn recompute_good_version(
        &self,
        module_path: &str,
    ) -> Result<Option<String>, StoreError> {
        self.inner.recompute_good_version(module_path).await
    }

    async fn get_latest_module_versions(
        &self,
        module_path: &str,
    ) -> Result<Option<LatestModuleVersions>, StoreError> {
        self.inner.get_latest_module_versions(module_path).await
    }

    async fn update_latest_module_versions(
        &self,
        latest: &LatestModuleVersions,
    ) -> Result<LatestModuleVersions, StoreError> {
        self.inner.update_latest_module_versions(latest).await
    }

    async fn upsert_version_map(&self, _entry: &VersionMapEntry) -> Result<(), StoreError> {
        Err(StoreError::Database("disk I/O error".to_string()))
    }

    async fn get_version_map(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> Result<Option<VersionMapEntry>, StoreError> {
        self.inner
            .get_version_map(module_path, requested_version)
            .await
    }

    async fn upsert_module_version_state(
        &self,
        update: &ModuleVersionStateUpdate,
    ) -> Result<(), StoreError> {
        self.inner.upsert_module_version_state(update).await
    }

    async fn get_module_version_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<ModuleVersionState>, StoreError> {
        self.inner.get_module_version_state(module_path, version).await
    }

    async fn get_package_version_states(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Vec<PackageVersionState>, StoreError> {
        self.inner
            .get_package_version_states(module_path, version)
            .await
    }

    async fn is_excluded(&self, module_path: &str, version: &str) -> Result<bool, StoreError> {
        self.inner.is_excluded(module_path, version).await
    }

    async fn insert_excluded_prefix(
        &self,
        prefix: &str,
        created_by: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .insert_excluded_prefix(prefix, created_by, reason)
            .await
    }

    async fn delete_older_versions_from_search(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<usize, StoreError> {
        self.inner
            .delete_older_versions_from_search(module_path, version)
            .await
    }

    async fn search_documents_for(
        &self,
        module_path: &str,
    ) -> Result<Vec<SearchDocument>, StoreError> {
        self.inner.search_documents_for(module_path).await
    }
}

#[tokio::test]
async fn test_version_map_failure_downgrades_to_internal_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(
        SqliteStore::new(&temp_dir.path().join("test.db")).expect("Failed to create store"),
    );
    let failing = Arc::new(FailingVersionMapStore {
        inner: store.clone(),
    });
    let h = TestHarness::with_store(store, failing, temp_dir);
    h.publish("example.com/mod", "v1.0.0", "module example.com/mod\n")
        .await;

    let outcome = h
        .fetcher
        .fetch_and_update_state("example.com/mod", "v1.0.0")
        .await;
    assert_eq!(outcome.status, Status::InternalError);
    assert!(outcome.status.is_retryable());

    // The module itself was stored before the failure.
    assert!(h
        .store
        .get_module("example.com/mod", "v1.0.0")
        .await
        .unwrap()
        .is_some());

    let state = h.state("example.com/mod", "v1.0.0").await;
    assert_eq!(state.status, Status::InternalError);
    assert!(state.next_processed_after.is_some());

    let reports = h.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].module_path, "example.com/mod");
}
