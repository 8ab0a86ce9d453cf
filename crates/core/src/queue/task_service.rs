//! Queue backed by an external task service that delivers each task as an
//! HTTP request to this worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{task_name, Queue, QueueError, ScheduleOptions, TaskServiceConfig};
use crate::metrics;
use crate::origin::encode_path;

#[derive(Debug, Error)]
pub enum TaskServiceError {
    /// A task with this name exists or existed recently.
    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("task service request failed: {0}")]
    Http(String),

    #[error("task service rejected task (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("task service misconfigured: {0}")]
    Config(String),
}

/// A task to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Deterministic name used for de-duplication.
    pub name: String,
    pub queue: String,
    /// URL the service calls to deliver the task.
    pub url: String,
    pub http_method: String,
}

/// Creates tasks on an external service.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, request: &TaskRequest) -> Result<(), TaskServiceError>;
}

/// [`TaskService`] speaking JSON over HTTP.
pub struct HttpTaskService {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTaskService {
    pub fn new(config: &TaskServiceConfig) -> Result<Self, TaskServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TaskServiceError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn create_task(&self, request: &TaskRequest) -> Result<(), TaskServiceError> {
        let url = format!(
            "{}/queues/{}/tasks",
            self.base_url,
            urlencoding::encode(&request.queue)
        );
        let mut builder = self.client.post(&url).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TaskServiceError::Http(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(TaskServiceError::AlreadyExists(request.name.clone())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(TaskServiceError::Rejected {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                })
            }
        }
    }
}

/// [`Queue`] that hands tasks to a [`TaskService`].
pub struct TaskServiceQueue {
    service: Arc<dyn TaskService>,
    queue_name: String,
    worker_url: String,
}

impl TaskServiceQueue {
    pub fn new(service: Arc<dyn TaskService>, queue_name: String, worker_url: String) -> Self {
        Self {
            service,
            queue_name,
            worker_url: worker_url.trim_end_matches('/').to_string(),
        }
    }

    /// Worker endpoint the task service calls for this fetch.
    pub fn task_url(&self, module_path: &str, version: &str, opts: &ScheduleOptions) -> String {
        let mut url = format!(
            "{}/api/v1/fetch/{}/@v/{}",
            self.worker_url,
            encode_path(module_path),
            encode_path(version)
        );

        let mut query = Vec::new();
        if opts.disable_origin_fetch {
            query.push("disable_origin_fetch=true".to_string());
        }
        if let Some(source) = &opts.source {
            query.push(format!("source={}", urlencoding::encode(source)));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }
}

#[async_trait]
impl Queue for TaskServiceQueue {
    async fn schedule_fetch(
        &self,
        module_path: &str,
        version: &str,
        opts: &ScheduleOptions,
    ) -> Result<bool, QueueError> {
        let request = TaskRequest {
            name: task_name(module_path, version, opts.suffix.as_deref()),
            queue: self.queue_name.clone(),
            url: self.task_url(module_path, version, opts),
            http_method: "POST".to_string(),
        };

        let (result, label) = match self.service.create_task(&request).await {
            Ok(()) => {
                debug!(module_path, version, task = %request.name, "Task created");
                (Ok(true), "enqueued")
            }
            Err(TaskServiceError::AlreadyExists(_)) => {
                debug!(module_path, version, task = %request.name, "Task already exists");
                (Ok(false), "duplicate")
            }
            Err(e) => {
                warn!(module_path, version, error = %e, "Failed to create task");
                (Err(QueueError::TaskService(e)), "error")
            }
        };

        metrics::QUEUE_SCHEDULED
            .with_label_values(&[self.backend_name(), opts.source_label(), label])
            .inc();
        result
    }

    fn backend_name(&self) -> &'static str {
        "task_service"
    }
}
