//! Store trait definition.

use async_trait::async_trait;

use super::{
    ModuleLock, ModuleVersionState, ModuleVersionStateUpdate, PackageVersionState,
    SearchDocument, StoreError, VersionMapEntry,
};
use crate::latest::LatestModuleVersions;
use crate::model::Module;

/// Durable state of the pipeline.
///
/// Methods that change module data or latest-version records take the
/// module path's advisory lock themselves. Callers holding a lock from
/// [`Store::lock_module`] must not call them for the same path.
#[async_trait]
pub trait Store: Send + Sync {
    /// Takes the advisory lock for `module_path`.
    async fn lock_module(&self, module_path: &str) -> ModuleLock;

    /// Inserts or replaces a module version. Returns whether it is now the
    /// module's good (latest stored, unretracted) version.
    async fn insert_module(&self, module: &Module) -> Result<bool, StoreError>;

    async fn get_module(&self, module_path: &str, version: &str)
        -> Result<Option<Module>, StoreError>;

    /// Removes a module version and its packages and search rows.
    async fn delete_module(&self, module_path: &str, version: &str) -> Result<(), StoreError>;

    /// Recomputes and persists the good version from stored modules.
    async fn recompute_good_version(&self, module_path: &str)
        -> Result<Option<String>, StoreError>;

    async fn get_latest_module_versions(
        &self,
        module_path: &str,
    ) -> Result<Option<LatestModuleVersions>, StoreError>;

    /// Writes `latest` (with a freshly computed good version) if it differs
    /// from the stored record, and returns the record as stored.
    async fn update_latest_module_versions(
        &self,
        latest: &LatestModuleVersions,
    ) -> Result<LatestModuleVersions, StoreError>;

    async fn upsert_version_map(&self, entry: &VersionMapEntry) -> Result<(), StoreError>;

    async fn get_version_map(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> Result<Option<VersionMapEntry>, StoreError>;

    /// Records one completed attempt, incrementing the try count.
    async fn upsert_module_version_state(
        &self,
        update: &ModuleVersionStateUpdate,
    ) -> Result<(), StoreError>;

    async fn get_module_version_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<ModuleVersionState>, StoreError>;

    async fn get_package_version_states(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Vec<PackageVersionState>, StoreError>;

    /// Whether `module_path` (or `module_path@version`) is excluded.
    async fn is_excluded(&self, module_path: &str, version: &str) -> Result<bool, StoreError>;

    async fn insert_excluded_prefix(
        &self,
        prefix: &str,
        created_by: &str,
        reason: &str,
    ) -> Result<(), StoreError>;

    /// Deletes search rows of `module_path` older than `version`. Returns the
    /// number of rows removed.
    async fn delete_older_versions_from_search(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<usize, StoreError>;

    async fn search_documents_for(
        &self,
        module_path: &str,
    ) -> Result<Vec<SearchDocument>, StoreError>;
}
