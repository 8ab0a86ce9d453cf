//! Mock task service for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::queue::{TaskRequest, TaskService, TaskServiceError};

/// Mock implementation of the TaskService trait.
///
/// Records created tasks and rejects repeated names the way a real task
/// service does.
#[derive(Debug, Default)]
pub struct MockTaskService {
    tasks: Arc<RwLock<Vec<TaskRequest>>>,
    names: Arc<RwLock<HashSet<String>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<TaskServiceError>>>,
}

impl MockTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn created_tasks(&self) -> Vec<TaskRequest> {
        self.tasks.read().await.clone()
    }

    pub async fn set_next_error(&self, error: TaskServiceError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl TaskService for MockTaskService {
    async fn create_task(&self, request: &TaskRequest) -> Result<(), TaskServiceError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if !self.names.write().await.insert(request.name.clone()) {
            return Err(TaskServiceError::AlreadyExists(request.name.clone()));
        }
        self.tasks.write().await.push(request.clone());
        Ok(())
    }
}
