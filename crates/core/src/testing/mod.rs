//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the upstream-facing traits,
//! allowing the fetch pipeline and queues to be exercised without a real
//! module proxy or task service.
//!
//! # Example
//!
//! ```rust,ignore
//! use modfetch_core::testing::{fixtures, MockModuleFetcher, MockOrigin};
//!
//! let origin = MockOrigin::new();
//! let fetcher = MockModuleFetcher::new();
//!
//! origin.add_version("example.com/mod", "v1.0.0", "module example.com/mod\n").await;
//! fetcher.add_module(fixtures::module("example.com/mod", "v1.0.0")).await;
//!
//! // Hand both to a Fetcher...
//! ```

mod mock_module_fetcher;
mod mock_origin;
mod mock_task_service;
mod recording_reporter;

pub use mock_module_fetcher::MockModuleFetcher;
pub use mock_origin::{MockOrigin, RecordedOriginCall};
pub use mock_task_service::MockTaskService;
pub use recording_reporter::{RecordedReport, RecordingReporter};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::build_context::BuildContext;
    use crate::fetch::Status;
    use crate::model::{Documentation, Module, ModuleInfo, Package};
    use crate::store::PackageVersionState;

    /// Create a module with a single documented package `<path>/pkg`.
    pub fn module(module_path: &str, version: &str) -> Module {
        let mut info = ModuleInfo::new(module_path, version);
        info.commit_time = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).single();
        info.has_go_mod = true;
        info.declared_path = Some(module_path.to_string());

        let doc = |goos: &str, goarch: &str| Documentation {
            build_context: BuildContext::new(goos, goarch),
            synopsis: "Package pkg does things.".to_string(),
            contents: format!("<p>Docs for {module_path}/pkg on {goos}/{goarch}</p>"),
        };

        Module {
            info,
            packages: vec![Package {
                path: format!("{module_path}/pkg"),
                name: "pkg".to_string(),
                synopsis: "Package pkg does things.".to_string(),
                documentation: vec![doc("linux", "amd64"), doc("windows", "amd64")],
            }],
        }
    }

    /// One state per package of `module`, all with `status`.
    pub fn package_states(module: &Module, status: Status) -> Vec<PackageVersionState> {
        module
            .packages
            .iter()
            .map(|p| PackageVersionState {
                package_path: p.path.clone(),
                module_path: module.info.module_path.clone(),
                version: module.info.version.clone(),
                status,
                error: (!status.is_success()).then(|| format!("{status}")),
            })
            .collect()
    }
}
