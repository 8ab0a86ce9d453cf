pub mod admission;
pub mod build_context;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod latest;
pub mod metrics;
pub mod model;
pub mod modpath;
pub mod origin;
pub mod queue;
pub mod report;
pub mod store;
pub mod testing;
pub mod version;

pub use admission::{AdmissionController, AdmissionStats, Reservation};
pub use build_context::BuildContext;
pub use cache::{Cache, CacheError, MemoryCache};
pub use config::{
    load_config, load_config_from_str, validate_config, AdmissionConfig, Config, ConfigError,
    DatabaseConfig, OriginConfig, SanitizedConfig, ServerConfig,
};
pub use fetch::{
    FetchConfig, FetchError, FetchOutcome, FetchRequest, FetchResult, Fetcher, ModuleFetcher,
    ProxyModuleFetcher, ResolvedModule, Status,
};
pub use latest::{LatestModuleVersions, LatestStatus, Retraction, VersionResolver};
pub use model::{Documentation, Module, ModuleInfo, Package};
pub use origin::{Origin, OriginError, ProxyOrigin, VersionInfo};
pub use queue::{
    create_queue, FetchTask, InMemoryQueue, Queue, QueueBackend, QueueConfig, QueueError,
    ScheduleOptions, TaskHandler,
};
pub use report::{ErrorReporter, TracingReporter};
pub use store::{SqliteStore, Store, StoreError};
