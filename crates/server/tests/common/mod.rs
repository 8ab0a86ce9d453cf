//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in process
//! with a mock origin and module fetcher, so the whole fetch pipeline runs
//! without network access.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use modfetch_core::{
    testing::{MockModuleFetcher, MockOrigin},
    AdmissionController, Config, DatabaseConfig, FetchConfig, Fetcher, InMemoryQueue,
    SqliteStore,
};
use modfetch_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use modfetch_core::testing::fixtures;

/// Test fixture for API testing with mock upstreams.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_fetch() {
///     let fixture = TestFixture::new().await;
///     fixture.publish("example.com/mod", "v1.0.0").await;
///
///     let response = fixture.post("/api/v1/fetch/example.com/mod/@v/v1.0.0").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock origin - publish versions and aliases
    pub origin: Arc<MockOrigin>,
    /// Mock module fetcher - serve module contents
    pub module_fetcher: Arc<MockModuleFetcher>,
    /// Store behind the fetcher
    pub store: Arc<SqliteStore>,
    /// In-memory queue behind the schedule endpoint
    pub queue: Arc<InMemoryQueue>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with an unlimited admission budget.
    pub async fn new() -> Self {
        Self::with_ceiling(u64::MAX).await
    }

    /// Create a test fixture with the given admission ceiling.
    pub async fn with_ceiling(ceiling: u64) -> Self {
        Self::build(ceiling, Config::default().queue.task_timeout_secs).await
    }

    /// Create a test fixture whose delivered fetches give up after `secs`.
    pub async fn with_task_timeout(secs: u64) -> Self {
        Self::build(u64::MAX, secs).await
    }

    async fn build(ceiling: u64, task_timeout_secs: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let origin = Arc::new(MockOrigin::new());
        let module_fetcher = Arc::new(MockModuleFetcher::new());
        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));

        let mut config = Config {
            database: DatabaseConfig { path: db_path },
            ..Default::default()
        };
        config.queue.task_timeout_secs = task_timeout_secs;

        let fetcher = Arc::new(Fetcher::new(
            FetchConfig::default(),
            origin.clone(),
            module_fetcher.clone(),
            store.clone(),
            AdmissionController::new(ceiling),
        ));
        let queue = Arc::new(InMemoryQueue::new(
            fetcher.clone(),
            2,
            16,
            Duration::from_secs(30),
        ));

        let state = Arc::new(AppState::new(config, fetcher, queue.clone()));
        let router = create_router(state);

        Self {
            router,
            origin,
            module_fetcher,
            store,
            queue,
            temp_dir,
        }
    }

    /// Make `module_path@version` available from both mocks.
    pub async fn publish(&self, module_path: &str, version: &str) {
        self.origin
            .add_version(module_path, version, &format!("module {module_path}\n"))
            .await;
        self.module_fetcher
            .add_module(fixtures::module(module_path, version))
            .await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a POST request and hang up after `patience`. Returns true if the
    /// caller gave up before the response arrived.
    pub async fn post_and_hang_up(&self, path: &str, patience: Duration) -> bool {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        tokio::time::timeout(patience, self.router.clone().oneshot(request))
            .await
            .is_err()
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
