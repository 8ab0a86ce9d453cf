//! Mock origin for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::origin::{Origin, OriginError, VersionInfo};
use crate::version;

/// A recorded origin call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOriginCall {
    /// `info`, `list` or `mod_file`.
    pub method: &'static str,
    pub module_path: String,
    pub version: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct MockModule {
    /// Module definition file per version.
    versions: BTreeMap<String, String>,
    aliases: HashMap<String, String>,
}

/// Mock implementation of the Origin trait.
///
/// Provides controllable behavior for testing:
/// - Publish versions with their module definition files
/// - Point branch aliases at versions
/// - Remove modules to simulate takedowns
/// - Fail a whole module, a single version, or the next call
///
/// # Example
///
/// ```rust,ignore
/// let origin = MockOrigin::new();
/// origin.add_version("example.com/mod", "v1.0.0", "module example.com/mod\n").await;
/// origin.set_alias("example.com/mod", "master", "v1.0.0").await;
///
/// let info = origin.info("example.com/mod", "latest").await?;
/// assert_eq!(info.version, "v1.0.0");
/// ```
#[derive(Debug, Default)]
pub struct MockOrigin {
    modules: Arc<RwLock<HashMap<String, MockModule>>>,
    calls: Arc<RwLock<Vec<RecordedOriginCall>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<OriginError>>>,
    /// Every call for these module paths fails.
    path_errors: Arc<RwLock<HashMap<String, OriginError>>>,
    /// `info` for these (path, version) pairs fails.
    version_errors: Arc<RwLock<HashMap<(String, String), OriginError>>>,
}

impl MockOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `version` of `module_path` with the given module file.
    pub async fn add_version(&self, module_path: &str, version: &str, mod_file: &str) {
        self.modules
            .write()
            .await
            .entry(module_path.to_string())
            .or_default()
            .versions
            .insert(version.to_string(), mod_file.to_string());
    }

    /// Make `alias` (e.g. a branch name) resolve to `version`.
    pub async fn set_alias(&self, module_path: &str, alias: &str, version: &str) {
        self.modules
            .write()
            .await
            .entry(module_path.to_string())
            .or_default()
            .aliases
            .insert(alias.to_string(), version.to_string());
    }

    /// Remove a module entirely, as after a takedown.
    pub async fn remove_module(&self, module_path: &str) {
        self.modules.write().await.remove(module_path);
    }

    pub async fn set_next_error(&self, error: OriginError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn fail_path(&self, module_path: &str, error: OriginError) {
        self.path_errors
            .write()
            .await
            .insert(module_path.to_string(), error);
    }

    pub async fn fail_version(&self, module_path: &str, version: &str, error: OriginError) {
        self.version_errors
            .write()
            .await
            .insert((module_path.to_string(), version.to_string()), error);
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<RecordedOriginCall> {
        self.calls.read().await.clone()
    }

    async fn begin(
        &self,
        method: &'static str,
        module_path: &str,
        version: Option<&str>,
    ) -> Result<Option<MockModule>, OriginError> {
        self.calls.write().await.push(RecordedOriginCall {
            method,
            module_path: module_path.to_string(),
            version: version.map(str::to_string),
        });

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(err) = self.path_errors.read().await.get(module_path) {
            return Err(err.clone());
        }
        if let Some(v) = version {
            let key = (module_path.to_string(), v.to_string());
            if let Some(err) = self.version_errors.read().await.get(&key) {
                return Err(err.clone());
            }
        }
        Ok(self.modules.read().await.get(module_path).cloned())
    }
}

fn not_found(module_path: &str, version: &str) -> OriginError {
    OriginError::NotFound(format!("{module_path}@{version}"))
}

#[async_trait]
impl Origin for MockOrigin {
    async fn info(&self, module_path: &str, version: &str) -> Result<VersionInfo, OriginError> {
        let module = self
            .begin("info", module_path, Some(version))
            .await?
            .ok_or_else(|| not_found(module_path, version))?;

        let resolved = if version == version::LATEST {
            version::latest_of(module.versions.keys().map(String::as_str)).map(str::to_string)
        } else if module.versions.contains_key(version) {
            Some(version.to_string())
        } else {
            module.aliases.get(version).cloned()
        };

        resolved
            .map(VersionInfo::new)
            .ok_or_else(|| not_found(module_path, version))
    }

    async fn list(&self, module_path: &str) -> Result<Vec<String>, OriginError> {
        let module = self
            .begin("list", module_path, None)
            .await?
            .ok_or_else(|| not_found(module_path, "list"))?;
        Ok(module.versions.keys().cloned().collect())
    }

    async fn mod_file(&self, module_path: &str, version: &str) -> Result<String, OriginError> {
        let module = self
            .begin("mod_file", module_path, Some(version))
            .await?
            .ok_or_else(|| not_found(module_path, version))?;
        module
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| not_found(module_path, version))
    }
}
