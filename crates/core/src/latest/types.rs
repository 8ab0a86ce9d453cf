//! Latest-version records.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::ModuleInfo;
use crate::version;

/// A retracted interval of versions, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retraction {
    pub low: String,
    pub high: String,
    #[serde(default)]
    pub rationale: String,
}

impl Retraction {
    pub fn single(version: impl Into<String>, rationale: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            low: version.clone(),
            high: version,
            rationale: rationale.into(),
        }
    }

    pub fn contains(&self, v: &str) -> bool {
        version::compare(&self.low, v) != Ordering::Greater
            && version::compare(v, &self.high) != Ordering::Greater
    }
}

/// Whether the origin knows the module at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestStatus {
    Found,
    NotFound,
}

impl LatestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatestStatus::Found => "found",
            LatestStatus::NotFound => "not_found",
        }
    }
}

/// Latest-version facts for one module path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestModuleVersions {
    pub module_path: String,
    pub status: LatestStatus,
    /// Newest version reported by the origin.
    pub raw_version: Option<String>,
    /// Newest version that is not retracted.
    pub cooked_version: Option<String>,
    /// Newest version successfully stored locally.
    pub good_version: Option<String>,
    pub deprecated: bool,
    pub deprecation_message: Option<String>,
    pub retractions: Vec<Retraction>,
}

impl LatestModuleVersions {
    pub fn not_found(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            status: LatestStatus::NotFound,
            raw_version: None,
            cooked_version: None,
            good_version: None,
            deprecated: false,
            deprecation_message: None,
            retractions: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == LatestStatus::Found
    }

    pub fn is_retracted(&self, version: &str) -> bool {
        self.retraction_for(version).is_some()
    }

    pub fn retraction_for(&self, version: &str) -> Option<&Retraction> {
        self.retractions.iter().find(|r| r.contains(version))
    }

    /// Copies deprecation and retraction facts onto `info`.
    pub fn populate_module_info(&self, info: &mut ModuleInfo) {
        info.deprecated = self.deprecated;
        info.deprecation_comment = self.deprecation_message.clone();
        match self.retraction_for(&info.version) {
            Some(r) => {
                info.retracted = true;
                info.retraction_rationale = (!r.rationale.is_empty()).then(|| r.rationale.clone());
            }
            None => {
                info.retracted = false;
                info.retraction_rationale = None;
            }
        }
    }
}
