//! Mock module fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixtures;
use crate::fetch::{
    FetchError, FetchRequest, FetchResult, ModuleFetcher, ResolvedModule, Status,
};
use crate::model::Module;
use crate::version;

type Key = (String, String);

/// Mock implementation of the ModuleFetcher trait.
///
/// Provides controllable behavior for testing:
/// - Serve configured modules
/// - Set per-version costs for admission tests
/// - Fail a version's fetch once with a chosen error
/// - Delay fetches to exercise timeouts
#[derive(Debug, Default)]
pub struct MockModuleFetcher {
    modules: Arc<RwLock<HashMap<Key, Module>>>,
    costs: Arc<RwLock<HashMap<Key, u64>>>,
    /// One-shot fetch errors.
    errors: Arc<RwLock<HashMap<Key, FetchError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    fetches: Arc<RwLock<Vec<Key>>>,
}

impl MockModuleFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_module(&self, module: Module) {
        let key = (module.info.module_path.clone(), module.info.version.clone());
        self.modules.write().await.insert(key, module);
    }

    /// Forget every version of `module_path`.
    pub async fn remove_module(&self, module_path: &str) {
        self.modules
            .write()
            .await
            .retain(|(path, _), _| path != module_path);
    }

    pub async fn set_cost(&self, module_path: &str, version: &str, cost: u64) {
        self.costs
            .write()
            .await
            .insert((module_path.to_string(), version.to_string()), cost);
    }

    /// The next fetch of `module_path@version` fails with `error`.
    pub async fn set_error(&self, module_path: &str, version: &str, error: FetchError) {
        self.errors
            .write()
            .await
            .insert((module_path.to_string(), version.to_string()), error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Number of `fetch` calls made.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    fn key(request: &FetchRequest, version: &str) -> Key {
        (request.module_path.clone(), version.to_string())
    }
}

#[async_trait]
impl ModuleFetcher for MockModuleFetcher {
    async fn resolve(&self, request: &FetchRequest) -> Result<ResolvedModule, FetchError> {
        let modules = self.modules.read().await;
        let errors = self.errors.read().await;
        let known: Vec<&str> = modules
            .keys()
            .chain(errors.keys())
            .filter(|(path, _)| *path == request.module_path)
            .map(|(_, v)| v.as_str())
            .collect();

        let found = if request.requested_version == version::LATEST {
            version::latest_of(known.iter().copied())
        } else {
            known
                .iter()
                .copied()
                .find(|v| *v == request.requested_version)
        };
        let resolved = found
            .map(str::to_string)
            .ok_or_else(|| {
                FetchError::NotFound(format!(
                    "{}@{}",
                    request.module_path, request.requested_version
                ))
            })?;

        let cost = self
            .costs
            .read()
            .await
            .get(&Self::key(request, &resolved))
            .copied()
            .unwrap_or(1);
        Ok(ResolvedModule {
            version: resolved,
            commit_time: None,
            approximate_cost: cost,
        })
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        resolved: &ResolvedModule,
    ) -> Result<FetchResult, FetchError> {
        let key = Self::key(request, &resolved.version);
        self.fetches.write().await.push(key.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.errors.write().await.remove(&key) {
            return Err(err);
        }

        let module = self
            .modules
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("{}@{}", key.0, key.1)))?;

        Ok(FetchResult {
            package_states: fixtures::package_states(&module, Status::Success),
            has_go_mod: true,
            declared_path: Some(module.info.module_path.clone()),
            module,
        })
    }
}
