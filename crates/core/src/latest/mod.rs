//! Latest-version, deprecation and retraction tracking.

pub mod modfile;
mod resolver;
mod types;

pub use resolver::VersionResolver;
pub use types::{LatestModuleVersions, LatestStatus, Retraction};
