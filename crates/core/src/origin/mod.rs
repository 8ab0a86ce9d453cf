//! The origin: the upstream module mirror serving version metadata,
//! module definition files and archives.

mod proxy;

pub use proxy::{decode_path, encode_path, ProxyOrigin};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by an [`Origin`].
#[derive(Debug, Clone, Error)]
pub enum OriginError {
    /// The module or version does not exist upstream (or was removed).
    #[error("not found at origin: {0}")]
    NotFound(String),

    /// The origin rejected the request as malformed.
    #[error("rejected by origin: {0}")]
    BadRequest(String),

    /// The origin did not answer in time.
    #[error("origin timed out: {0}")]
    TimedOut(String),

    /// Transport failure.
    #[error("origin request failed: {0}")]
    Request(String),

    /// The origin answered with something unexpected.
    #[error("invalid origin response: {0}")]
    InvalidResponse(String),
}

/// Metadata for one resolved version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl VersionInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            time: None,
        }
    }
}

/// Read access to the upstream module mirror.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Resolves `version` (a semantic version or an alias such as `latest`
    /// or a branch name) for `module_path`.
    async fn info(&self, module_path: &str, version: &str) -> Result<VersionInfo, OriginError>;

    /// Lists the tagged versions known for `module_path`.
    async fn list(&self, module_path: &str) -> Result<Vec<String>, OriginError>;

    /// Returns the module definition file at `version`.
    async fn mod_file(&self, module_path: &str, version: &str) -> Result<String, OriginError>;
}
