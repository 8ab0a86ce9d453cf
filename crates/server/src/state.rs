use std::sync::Arc;
use std::time::Duration;

use modfetch_core::{AdmissionStats, Config, Fetcher, Queue, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    fetcher: Arc<Fetcher>,
    queue: Arc<dyn Queue>,
}

impl AppState {
    pub fn new(config: Config, fetcher: Arc<Fetcher>, queue: Arc<dyn Queue>) -> Self {
        Self {
            config,
            fetcher,
            queue,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn fetcher(&self) -> &Fetcher {
        self.fetcher.as_ref()
    }

    /// Owned handle for work that must outlive the request.
    pub fn shared_fetcher(&self) -> Arc<Fetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Ceiling on one delivered task, shared with the in-process queue.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.config.queue.task_timeout_secs)
    }

    pub fn queue(&self) -> &dyn Queue {
        self.queue.as_ref()
    }

    pub fn admission_stats(&self) -> AdmissionStats {
        self.fetcher.admission().stats()
    }
}
