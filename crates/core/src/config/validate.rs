use super::{types::Config, ConfigError};
use crate::queue::QueueBackend;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Origin URL is http(s)
/// - Admission ceiling, worker count and buffer size are non-zero
/// - The task service section exists when that backend is selected
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if !is_http_url(&config.origin.url) {
        return Err(ConfigError::ValidationError(format!(
            "origin.url must be an http(s) URL, got '{}'",
            config.origin.url
        )));
    }

    if config.admission.max_in_flight_cost == 0 {
        return Err(ConfigError::ValidationError(
            "admission.max_in_flight_cost cannot be 0".to_string(),
        ));
    }

    let queue = &config.queue;
    match queue.backend {
        QueueBackend::InMemory => {
            if queue.workers == 0 {
                return Err(ConfigError::ValidationError(
                    "queue.workers cannot be 0".to_string(),
                ));
            }
            if queue.buffer_size == 0 {
                return Err(ConfigError::ValidationError(
                    "queue.buffer_size cannot be 0".to_string(),
                ));
            }
        }
        QueueBackend::TaskService => {
            let Some(ts) = &queue.task_service else {
                return Err(ConfigError::ValidationError(
                    "queue.task_service is required when queue.backend = \"task_service\""
                        .to_string(),
                ));
            };
            if !is_http_url(&ts.url) || !is_http_url(&ts.worker_url) {
                return Err(ConfigError::ValidationError(
                    "queue.task_service.url and worker_url must be http(s) URLs".to_string(),
                ));
            }
            if ts.queue_name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "queue.task_service.queue_name cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
