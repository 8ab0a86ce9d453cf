//! The fetch orchestrator.
//!
//! Drives one `(module_path, requested_version)` through:
//! 1. origin warm-up
//! 2. latest-version refresh
//! 3. floating-pointer lookups
//! 4. resolve, exclusion check, admission, fetch
//! 5. store (and cache invalidation for a new latest version)
//! 6. deletion of stale data after a terminal failure
//! 7. version-map rows
//! 8. module version state

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{
    FetchConfig, FetchError, FetchOutcome, FetchRequest, FetchResult, FetchTimings, ModuleFetcher,
    ResolvedModule, Status,
};
use crate::admission::AdmissionController;
use crate::cache::{invalidate_path, Cache};
use crate::latest::{LatestModuleVersions, VersionResolver};
use crate::metrics;
use crate::modpath::{check_module_path, series_path, STDLIB_MODULE_PATH, UNKNOWN_MODULE_PATH};
use crate::origin::{Origin, OriginError};
use crate::queue::{FetchTask, TaskHandler};
use crate::report::{ErrorReporter, TracingReporter};
use crate::store::{ModuleVersionStateUpdate, Store, VersionMapEntry};
use crate::version;

/// Fetches modules and records the outcome of every attempt.
pub struct Fetcher {
    config: FetchConfig,
    origin: Arc<dyn Origin>,
    module_fetcher: Arc<dyn ModuleFetcher>,
    store: Arc<dyn Store>,
    cache: Option<Arc<dyn Cache>>,
    admission: AdmissionController,
    resolver: VersionResolver,
    reporter: Arc<dyn ErrorReporter>,
}

/// Where the fetch step ended.
struct FetchStep {
    resolved: Option<ResolvedModule>,
    result: Result<FetchResult, FetchError>,
}

impl Fetcher {
    pub fn new(
        config: FetchConfig,
        origin: Arc<dyn Origin>,
        module_fetcher: Arc<dyn ModuleFetcher>,
        store: Arc<dyn Store>,
        admission: AdmissionController,
    ) -> Self {
        let resolver = VersionResolver::new(Arc::clone(&origin), Arc::clone(&store));
        Self {
            config,
            origin,
            module_fetcher,
            store,
            cache: None,
            admission,
            resolver,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Invalidate `cache` when a new latest version is stored.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Fetches `module_path@requested_version` with default options.
    pub async fn fetch_and_update_state(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> FetchOutcome {
        self.fetch(&FetchTask::new(module_path, requested_version))
            .await
    }

    /// Runs the full pipeline for `task`. Never panics on collaborator
    /// failures; every failure is folded into the returned status.
    pub async fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        let start = Instant::now();
        let module_path = task.module_path.as_str();
        let requested = task.version.as_str();

        if let Err(e) = check_request(module_path, requested) {
            error!(module_path, version = requested, error = %e, "Rejecting malformed request");
            return self.finish(task, FetchOutcome::failed(e), start);
        }

        let mut timings = FetchTimings::default();

        // 1. Warm the origin. Best effort.
        if !task.disable_origin_fetch {
            let t = Instant::now();
            if let Err(e) = self.origin.info(module_path, requested).await {
                debug!(module_path, version = requested, error = %e, "Origin warm-up failed");
            }
            timings.record("warm_origin", t.elapsed());
        }

        // 2. Refresh latest versions.
        let t = Instant::now();
        let latest = match self.resolver.refresh_latest(module_path).await {
            Ok(latest) => latest,
            Err(e) => {
                timings.record("refresh_latest", t.elapsed());
                let status = if e.status().is_retryable() {
                    e.status()
                } else {
                    Status::InternalError
                };
                warn!(module_path, version = requested, error = %e, "Latest-version refresh failed");
                let outcome = FetchOutcome {
                    status,
                    resolved_version: None,
                    error: Some(e),
                };
                return self.finish(task, outcome, start);
            }
        };
        timings.record("refresh_latest", t.elapsed());

        // 3. Floating pointers, concurrently.
        let t = Instant::now();
        let pointers = if task.disable_origin_fetch {
            Vec::new()
        } else {
            self.resolve_floating_pointers(module_path, requested).await
        };
        timings.record("floating_pointers", t.elapsed());

        // 4. Resolve and fetch.
        let request = FetchRequest {
            module_path: module_path.to_string(),
            requested_version: requested.to_string(),
            disable_origin_fetch: task.disable_origin_fetch,
        };
        let step = self.fetch_module(&request, &latest, &mut timings).await;
        let resolved_version = step.resolved.as_ref().map(|r| r.version.clone());

        let mut declared_path = None;
        let mut has_go_mod = false;
        let mut num_packages = None;
        let mut package_states = Vec::new();

        let mut outcome = match step.result {
            Ok(fetched) => {
                // 5. Store.
                let status = fetched.status();
                let t = Instant::now();
                let stored = self.store.insert_module(&fetched.module).await;
                timings.record("insert_module", t.elapsed());

                declared_path = fetched.declared_path.clone();
                has_go_mod = fetched.has_go_mod;
                num_packages = u32::try_from(fetched.module.packages.len()).ok();
                package_states = fetched.package_states;

                match stored {
                    Ok(is_latest) => {
                        if is_latest {
                            self.invalidate_cache(module_path).await;
                        }
                        FetchOutcome {
                            status,
                            resolved_version: resolved_version.clone(),
                            error: None,
                        }
                    }
                    Err(e) => FetchOutcome {
                        status: Status::InternalError,
                        resolved_version: resolved_version.clone(),
                        error: Some(FetchError::Store(e)),
                    },
                }
            }
            Err(e) => {
                if let FetchError::AlternativeModule { declared, .. } = e.root() {
                    declared_path = Some(declared.clone());
                }
                FetchOutcome {
                    status: e.status(),
                    resolved_version: resolved_version.clone(),
                    error: Some(e),
                }
            }
        };

        // 6. Terminal failures remove whatever was stored for the version.
        if outcome.status.is_client_error() {
            let target = resolved_version
                .as_deref()
                .or_else(|| version::is_valid(requested).then_some(requested));
            if let Some(target) = target {
                let t = Instant::now();
                if let Err(e) = self.delete_stale(module_path, target, outcome.status).await {
                    error!(module_path, version = target, error = %e, "Failed to delete stale module data");
                    outcome.status = Status::InternalError;
                    outcome.error = Some(e);
                }
                timings.record("delete_stale", t.elapsed());
            }
        }

        // 7. Version map for the request and every pointer that agrees.
        let error_message = outcome.error_message();
        let now = Utc::now();
        let mut requested_versions = vec![requested.to_string()];
        requested_versions.extend(
            pointers
                .into_iter()
                .filter(|(pointer, resolved)| {
                    pointer != requested && Some(resolved) == resolved_version.as_ref()
                })
                .map(|(pointer, _)| pointer),
        );
        for requested_version in requested_versions {
            let entry = VersionMapEntry {
                module_path: module_path.to_string(),
                requested_version,
                resolved_version: resolved_version.clone(),
                status: outcome.status,
                error: error_message.clone(),
                go_mod_path: declared_path.clone(),
                updated_at: now,
            };
            if let Err(e) = self.store.upsert_version_map(&entry).await {
                error!(
                    module_path,
                    requested = %entry.requested_version,
                    error = %e,
                    "Failed to upsert version map"
                );
                outcome.status = Status::InternalError;
                outcome.error = Some(FetchError::Store(e));
            }
        }

        if !version::is_valid(requested) {
            debug!(module_path, version = requested, %timings, "Skipping state for non-semver request");
            return self.finish(task, outcome, start);
        }

        // 8. Module version state.
        let update = ModuleVersionStateUpdate {
            module_path: module_path.to_string(),
            version: requested.to_string(),
            status: outcome.status,
            error: outcome.error_message(),
            index_timestamp: task.index_timestamp,
            go_mod_path: declared_path,
            has_go_mod,
            num_packages,
            package_states,
        };
        if let Err(e) = self.store.upsert_module_version_state(&update).await {
            error!(module_path, version = requested, error = %e, "Failed to upsert module version state");
            outcome.status = Status::InternalError;
            outcome.error = Some(FetchError::Store(e));
        }

        debug!(module_path, version = requested, %timings, "Fetch timings");
        self.finish(task, outcome, start)
    }

    async fn resolve_floating_pointers(
        &self,
        module_path: &str,
        requested: &str,
    ) -> Vec<(String, String)> {
        let lookups = self
            .config
            .floating_pointers
            .iter()
            .filter(|pointer| pointer.as_str() != requested)
            .map(|pointer| async move {
                (pointer.clone(), self.origin.info(module_path, pointer).await)
            });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(pointer, result)| match result {
                Ok(info) => Some((pointer, info.version)),
                Err(OriginError::NotFound(_)) => {
                    debug!(module_path, %pointer, "Floating pointer not found");
                    None
                }
                Err(e) => {
                    warn!(module_path, %pointer, error = %e, "Floating pointer lookup failed");
                    None
                }
            })
            .collect()
    }

    async fn fetch_module(
        &self,
        request: &FetchRequest,
        latest: &LatestModuleVersions,
        timings: &mut FetchTimings,
    ) -> FetchStep {
        let module_path = request.module_path.as_str();

        if let Err(e) = self.check_excluded(module_path, &request.requested_version).await {
            return FetchStep {
                resolved: None,
                result: Err(e),
            };
        }

        let t = Instant::now();
        let resolved = self.module_fetcher.resolve(request).await;
        timings.record("resolve", t.elapsed());
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                return FetchStep {
                    resolved: None,
                    result: Err(e),
                }
            }
        };

        if resolved.version != request.requested_version {
            if let Err(e) = self.check_excluded(module_path, &resolved.version).await {
                return FetchStep {
                    resolved: Some(resolved),
                    result: Err(e),
                };
            }
        }

        let reservation = self.admission.reserve(resolved.approximate_cost);
        if reservation.is_shed() {
            warn!(
                module_path,
                version = %resolved.version,
                cost = resolved.approximate_cost,
                "Shedding load"
            );
            let cost = reservation.cost();
            return FetchStep {
                resolved: Some(resolved),
                result: Err(FetchError::SheddingLoad { cost }),
            };
        }

        let t = Instant::now();
        let result = self.module_fetcher.fetch(request, &resolved).await;
        reservation.release();
        timings.record("fetch", t.elapsed());

        let result = result.map(|mut fetched| {
            latest.populate_module_info(&mut fetched.module.info);
            fetched
        });
        FetchStep {
            resolved: Some(resolved),
            result,
        }
    }

    async fn check_excluded(&self, module_path: &str, version: &str) -> Result<(), FetchError> {
        if self.store.is_excluded(module_path, version).await? {
            info!(module_path, version, "Module is excluded");
            return Err(FetchError::Excluded(format!("{module_path}@{version}")));
        }
        Ok(())
    }

    async fn delete_stale(
        &self,
        module_path: &str,
        version: &str,
        status: Status,
    ) -> Result<(), FetchError> {
        if status == Status::AlternativeModule {
            self.store
                .delete_older_versions_from_search(module_path, version)
                .await?;
        }
        self.store.delete_module(module_path, version).await?;
        self.store.recompute_good_version(module_path).await?;
        debug!(module_path, version, %status, "Deleted stale module data");
        Ok(())
    }

    async fn invalidate_cache(&self, module_path: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        if !self.config.cache_enabled {
            return;
        }
        let path = format!("/{}", series_path(module_path));
        if let Err(e) = invalidate_path(cache.as_ref(), &path).await {
            let err = FetchError::Cache(e);
            error!(module_path, %path, error = %err, "Cache invalidation failed");
            self.reporter.report(module_path, "", &err);
        }
    }

    fn finish(&self, task: &FetchTask, outcome: FetchOutcome, start: Instant) -> FetchOutcome {
        let elapsed = start.elapsed();
        let status = outcome.status;
        metrics::FETCH_OUTCOMES
            .with_label_values(&[status.as_str(), task.source_label()])
            .inc();
        metrics::FETCH_DURATION
            .with_label_values(&[status.as_str()])
            .observe(elapsed.as_secs_f64());

        let module_path = task.module_path.as_str();
        let version = task.version.as_str();
        let resolved = outcome.resolved_version.as_deref().unwrap_or("");
        let error = outcome.error_message().unwrap_or_default();

        if status.is_success() {
            info!(module_path, version, resolved, %status, elapsed_ms = elapsed.as_millis() as u64, "Fetch finished");
        } else if status.is_client_error() {
            warn!(module_path, version, resolved, %status, %error, "Fetch failed");
        } else {
            error!(module_path, version, resolved, %status, %error, "Fetch failed");
        }

        if status == Status::InternalError {
            if let Some(err) = &outcome.error {
                self.reporter.report(module_path, version, err);
            }
        }
        outcome
    }
}

/// Rejects requests no origin could satisfy. These are terminal and are
/// never handed to a collaborator.
fn check_request(module_path: &str, requested: &str) -> Result<(), FetchError> {
    if module_path == UNKNOWN_MODULE_PATH {
        return Err(FetchError::BadRequest(format!(
            "{module_path} is not a fetchable module path"
        )));
    }
    if module_path != STDLIB_MODULE_PATH {
        check_module_path(module_path).map_err(|e| FetchError::BadRequest(e.to_string()))?;
    }
    if !version::is_plausible(requested) {
        return Err(FetchError::BadRequest(format!(
            "{requested:?} is not a version or alias"
        )));
    }
    Ok(())
}

#[async_trait]
impl TaskHandler for Fetcher {
    async fn process(&self, task: FetchTask) -> Status {
        self.fetch(&task).await.status
    }
}
