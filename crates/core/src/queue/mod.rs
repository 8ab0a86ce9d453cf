//! Fetch scheduling.
//!
//! Two backends share the [`Queue`] trait:
//! - [`InMemoryQueue`]: a worker pool inside this process
//! - [`TaskServiceQueue`]: an external task service calling back over HTTP
//!
//! Both deliver at least once and de-duplicate on a best-effort basis.

mod config;
mod detached;
mod in_memory;
mod task_name;
mod task_service;

pub use config::{QueueBackend, QueueConfig, TaskServiceConfig};
pub use detached::spawn_detached;
pub use in_memory::InMemoryQueue;
pub use task_name::task_name;
pub use task_service::{
    HttpTaskService, TaskRequest, TaskService, TaskServiceError, TaskServiceQueue,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::Status;

/// Errors returned when scheduling.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue no longer accepts work.
    #[error("queue is closed")]
    Closed,

    #[error("task service error: {0}")]
    TaskService(#[from] TaskServiceError),
}

/// Per-request scheduling options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// Distinguishes otherwise identical tasks so they are not
    /// de-duplicated against each other (e.g. a forced reprocess).
    #[serde(default)]
    pub suffix: Option<String>,
    /// Ask the origin to serve only content it already has.
    #[serde(default)]
    pub disable_origin_fetch: bool,
    /// Who asked, for logs and metrics.
    #[serde(default)]
    pub source: Option<String>,
}

impl ScheduleOptions {
    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or("unknown")
    }
}

/// One unit of work delivered to a worker. Never persisted by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub module_path: String,
    pub version: String,
    pub disable_origin_fetch: bool,
    pub source: Option<String>,
    pub request_id: String,
    /// When the origin first announced this version, if known.
    pub index_timestamp: Option<DateTime<Utc>>,
}

impl FetchTask {
    pub fn new(module_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            version: version.into(),
            disable_origin_fetch: false,
            source: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            index_timestamp: None,
        }
    }

    pub fn with_options(mut self, opts: &ScheduleOptions) -> Self {
        self.disable_origin_fetch = opts.disable_origin_fetch;
        self.source = opts.source.clone();
        self
    }

    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or("unknown")
    }
}

/// Accepts fetch requests for later processing.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Schedules a fetch of `module_path@version`. Returns `Ok(false)` when
    /// an identical task is already pending.
    async fn schedule_fetch(
        &self,
        module_path: &str,
        version: &str,
        opts: &ScheduleOptions,
    ) -> Result<bool, QueueError>;

    /// Backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Processes delivered tasks. Implemented by the fetch orchestrator.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn process(&self, task: FetchTask) -> Status;
}

/// Builds the queue selected by `config`.
pub fn create_queue(
    config: &QueueConfig,
    handler: Arc<dyn TaskHandler>,
) -> Result<Arc<dyn Queue>, QueueError> {
    match config.backend {
        QueueBackend::InMemory => Ok(Arc::new(InMemoryQueue::new(
            handler,
            config.workers,
            config.buffer_size,
            Duration::from_secs(config.task_timeout_secs),
        ))),
        QueueBackend::TaskService => {
            let ts = config.task_service.as_ref().ok_or_else(|| {
                TaskServiceError::Config("queue.task_service section missing".to_string())
            })?;
            let service = HttpTaskService::new(ts)?;
            Ok(Arc::new(TaskServiceQueue::new(
                Arc::new(service),
                ts.queue_name.clone(),
                ts.worker_url.clone(),
            )))
        }
    }
}
