//! Persisted records and store errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::Status;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Processing record for one `(module_path, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionState {
    pub module_path: String,
    pub version: String,
    pub status: Status,
    pub error: Option<String>,
    /// Number of completed attempts.
    pub try_count: u32,
    pub index_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_processed_at: Option<DateTime<Utc>>,
    /// Set for retryable outcomes only.
    pub next_processed_after: Option<DateTime<Utc>>,
    /// Path declared in the module definition file.
    pub go_mod_path: Option<String>,
    pub has_go_mod: bool,
    pub num_packages: Option<u32>,
}

/// Values written by one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersionStateUpdate {
    pub module_path: String,
    pub version: String,
    pub status: Status,
    pub error: Option<String>,
    pub index_timestamp: Option<DateTime<Utc>>,
    pub go_mod_path: Option<String>,
    pub has_go_mod: bool,
    pub num_packages: Option<u32>,
    pub package_states: Vec<PackageVersionState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersionState {
    pub package_path: String,
    pub module_path: String,
    pub version: String,
    pub status: Status,
    pub error: Option<String>,
}

/// Where a requested version (possibly an alias) led.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMapEntry {
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: Option<String>,
    pub status: Status,
    pub error: Option<String>,
    pub go_mod_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An administrative exclusion.
///
/// Matches a module path equal to the prefix or below it, or a single
/// version when written as `path@version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedPrefix {
    pub prefix: String,
    pub created_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Search row for a package at its module's latest version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub package_path: String,
    pub module_path: String,
    pub version: String,
    pub synopsis: String,
}
