//! Latest-version resolution against the origin.

use std::sync::Arc;

use tracing::{debug, info};

use super::{modfile, LatestModuleVersions, LatestStatus};
use crate::fetch::{FetchError, FetchResultExt};
use crate::origin::{Origin, OriginError};
use crate::store::Store;
use crate::version;

/// Computes and persists [`LatestModuleVersions`] records.
#[derive(Clone)]
pub struct VersionResolver {
    origin: Arc<dyn Origin>,
    store: Arc<dyn Store>,
}

impl VersionResolver {
    pub fn new(origin: Arc<dyn Origin>, store: Arc<dyn Store>) -> Self {
        Self { origin, store }
    }

    /// Asks the origin for the module's newest version, reads its
    /// deprecation and retractions, and stores the result.
    ///
    /// A module unknown to the origin yields (and stores) a not-found record
    /// rather than an error.
    pub async fn refresh_latest(
        &self,
        module_path: &str,
    ) -> Result<LatestModuleVersions, FetchError> {
        let latest = match self.compute(module_path).await? {
            Some(latest) => latest,
            None => {
                debug!(module_path, "Module not found at origin");
                LatestModuleVersions::not_found(module_path)
            }
        };

        let stored = self
            .store
            .update_latest_module_versions(&latest)
            .await
            .context("update_latest_module_versions")?;
        info!(
            module_path,
            raw = ?stored.raw_version,
            cooked = ?stored.cooked_version,
            good = ?stored.good_version,
            "Refreshed latest versions"
        );
        Ok(stored)
    }

    async fn compute(&self, module_path: &str) -> Result<Option<LatestModuleVersions>, FetchError> {
        let raw = match self.origin.info(module_path, version::LATEST).await {
            Ok(info) => info.version,
            Err(OriginError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e).context("origin.info(latest)"),
        };

        let contents = self
            .origin
            .mod_file(module_path, &raw)
            .await
            .with_context(|| format!("origin.mod_file({raw})"))?;
        let file = modfile::parse(&contents);

        let mut latest = LatestModuleVersions {
            module_path: module_path.to_string(),
            status: LatestStatus::Found,
            raw_version: Some(raw.clone()),
            cooked_version: None,
            good_version: None,
            deprecated: file.deprecation.is_some(),
            deprecation_message: file.deprecation,
            retractions: file.retractions,
        };

        latest.cooked_version = if latest.is_retracted(&raw) {
            self.newest_unretracted(module_path, &latest).await?
        } else {
            Some(raw)
        };

        Ok(Some(latest))
    }

    async fn newest_unretracted(
        &self,
        module_path: &str,
        latest: &LatestModuleVersions,
    ) -> Result<Option<String>, FetchError> {
        let mut versions = self
            .origin
            .list(module_path)
            .await
            .context("origin.list")?;
        version::sort_by_preference(&mut versions);
        Ok(versions
            .into_iter()
            .find(|v| version::is_valid(v) && !latest.is_retracted(v)))
    }
}
