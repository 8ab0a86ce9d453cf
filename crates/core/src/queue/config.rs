//! Queue configuration.

use serde::{Deserialize, Serialize};

/// Which queue implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    #[default]
    InMemory,
    TaskService,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,

    /// Worker tasks for the in-memory backend.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pending tasks the in-memory channel holds before callers wait.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Ceiling on one task's run time (seconds).
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Required when `backend = "task_service"`.
    #[serde(default)]
    pub task_service: Option<TaskServiceConfig>,
}

fn default_workers() -> usize {
    10
}

fn default_buffer_size() -> usize {
    1000
}

fn default_task_timeout() -> u64 {
    600 // 10 minutes
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            workers: default_workers(),
            buffer_size: default_buffer_size(),
            task_timeout_secs: default_task_timeout(),
            task_service: None,
        }
    }
}

/// External task service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskServiceConfig {
    /// Base URL of the task service API.
    pub url: String,
    pub queue_name: String,
    /// Base URL the service calls back to deliver tasks.
    pub worker_url: String,
    #[serde(default = "default_task_service_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_task_service_timeout() -> u64 {
    30
}
