//! Fetch pipeline: status taxonomy, errors, module fetchers and the
//! orchestrator that records every attempt.

mod config;
mod error;
mod fetcher;
mod orchestrator;
mod status;
mod types;

pub use config::FetchConfig;
pub use error::{FetchError, FetchResultExt};
pub use fetcher::{build_result, ModuleFetcher, ProxyModuleFetcher};
pub use orchestrator::Fetcher;
pub use status::Status;
pub use types::{FetchOutcome, FetchRequest, FetchResult, FetchTimings, ResolvedModule};
