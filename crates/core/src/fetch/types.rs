//! Types shared by the orchestrator and module fetchers.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{FetchError, Status};
use crate::metrics;
use crate::model::Module;
use crate::store::PackageVersionState;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub module_path: String,
    /// As requested; may be an alias such as `latest` or a branch name.
    pub requested_version: String,
    /// Ask the origin to serve only content it already has.
    pub disable_origin_fetch: bool,
}

/// A version resolved by a [`super::ModuleFetcher`], with its cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub version: String,
    pub commit_time: Option<DateTime<Utc>>,
    /// Approximate processing cost, in bytes of compressed archive.
    pub approximate_cost: u64,
}

/// A fetched module ready to be stored.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub module: Module,
    pub package_states: Vec<PackageVersionState>,
    pub has_go_mod: bool,
    pub declared_path: Option<String>,
}

impl FetchResult {
    /// `PartialSuccess` when some packages could not be processed.
    pub fn status(&self) -> Status {
        let failed_package = self.package_states.iter().any(|p| !p.status.is_success());
        if self.module.info.incomplete || failed_package {
            Status::PartialSuccess
        } else {
            Status::Success
        }
    }
}

/// Result of one orchestrated fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub status: Status,
    pub resolved_version: Option<String>,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn failed(error: FetchError) -> Self {
        Self {
            status: error.status(),
            resolved_version: None,
            error: Some(error),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Wall-clock time spent in each pipeline step.
#[derive(Debug, Clone, Default)]
pub struct FetchTimings {
    steps: Vec<(&'static str, Duration)>,
}

impl FetchTimings {
    pub fn record(&mut self, step: &'static str, elapsed: Duration) {
        metrics::FETCH_STEP_DURATION
            .with_label_values(&[step])
            .observe(elapsed.as_secs_f64());
        self.steps.push((step, elapsed));
    }

    pub fn get(&self, step: &str) -> Option<Duration> {
        self.steps
            .iter()
            .find(|(name, _)| *name == step)
            .map(|(_, d)| *d)
    }

    pub fn steps(&self) -> &[(&'static str, Duration)] {
        &self.steps
    }
}

impl std::fmt::Display for FetchTimings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (step, d)) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{step}={}ms", d.as_millis())?;
        }
        Ok(())
    }
}
