use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::fetch::FetchConfig;
use crate::queue::{QueueBackend, QueueConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("modfetch.db")
}

/// Upstream module proxy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginConfig {
    /// Base URL of the proxy (e.g., "https://proxy.golang.org")
    #[serde(default = "default_origin_url")]
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_origin_timeout")]
    pub timeout_secs: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: default_origin_url(),
            timeout_secs: default_origin_timeout(),
        }
    }
}

fn default_origin_url() -> String {
    "https://proxy.golang.org".to_string()
}

fn default_origin_timeout() -> u64 {
    30
}

/// Admission control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    /// Total cost (bytes of compressed archives) allowed in flight.
    #[serde(default = "default_max_in_flight_cost")]
    pub max_in_flight_cost: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_in_flight_cost: default_max_in_flight_cost(),
        }
    }
}

fn default_max_in_flight_cost() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub origin: OriginConfig,
    pub admission: AdmissionConfig,
    pub queue: SanitizedQueueConfig,
    pub fetch: FetchConfig,
}

/// Sanitized queue config (auth token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQueueConfig {
    pub backend: String,
    pub workers: usize,
    pub buffer_size: usize,
    pub task_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_service: Option<SanitizedTaskServiceConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTaskServiceConfig {
    pub url: String,
    pub queue_name: String,
    pub worker_url: String,
    pub auth_token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            origin: config.origin.clone(),
            admission: config.admission.clone(),
            queue: SanitizedQueueConfig {
                backend: match config.queue.backend {
                    QueueBackend::InMemory => "in_memory".to_string(),
                    QueueBackend::TaskService => "task_service".to_string(),
                },
                workers: config.queue.workers,
                buffer_size: config.queue.buffer_size,
                task_timeout_secs: config.queue.task_timeout_secs,
                task_service: config.queue.task_service.as_ref().map(|t| {
                    SanitizedTaskServiceConfig {
                        url: t.url.clone(),
                        queue_name: t.queue_name.clone(),
                        worker_url: t.worker_url.clone(),
                        auth_token_configured: t
                            .auth_token
                            .as_ref()
                            .is_some_and(|token| !token.is_empty()),
                    }
                }),
            },
            fetch: config.fetch.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskServiceConfig;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "modfetch.db");
        assert_eq!(config.origin.url, "https://proxy.golang.org");
        assert_eq!(config.admission.max_in_flight_cost, 2 * 1024 * 1024 * 1024);
        assert_eq!(config.queue.backend, QueueBackend::InMemory);
        assert_eq!(config.fetch.floating_pointers, vec!["master", "main"]);
    }

    #[test]
    fn test_deserialize_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[origin]
url = "http://localhost:3000"
timeout_secs = 5

[admission]
max_in_flight_cost = 1024

[queue]
backend = "task_service"
workers = 4

[queue.task_service]
url = "http://tasks.internal"
queue_name = "fetch"
worker_url = "http://worker.internal"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.origin.timeout_secs, 5);
        assert_eq!(config.admission.max_in_flight_cost, 1024);
        assert_eq!(config.queue.backend, QueueBackend::TaskService);
        assert_eq!(config.queue.workers, 4);
        let ts = config.queue.task_service.unwrap();
        assert_eq!(ts.queue_name, "fetch");
        assert!(ts.auth_token.is_none());
    }

    #[test]
    fn test_unknown_backend_fails() {
        let toml = r#"
[queue]
backend = "carrier_pigeon"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_token() {
        let mut config = Config::default();
        config.queue.backend = QueueBackend::TaskService;
        config.queue.task_service = Some(TaskServiceConfig {
            url: "http://tasks".to_string(),
            queue_name: "fetch".to_string(),
            worker_url: "http://worker".to_string(),
            timeout_secs: 10,
            auth_token: Some("secret".to_string()),
        });

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.queue.backend, "task_service");
        let ts = sanitized.queue.task_service.as_ref().unwrap();
        assert!(ts.auth_token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
