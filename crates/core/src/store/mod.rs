//! Persistence for modules, version states and latest-version records.

mod locks;
mod sqlite;
mod traits;
mod types;

pub use locks::{ModuleLock, ModuleLocks};
pub use sqlite::SqliteStore;
pub use traits::Store;
pub use types::{
    ExcludedPrefix, ModuleVersionState, ModuleVersionStateUpdate, PackageVersionState,
    SearchDocument, StoreError, VersionMapEntry,
};
