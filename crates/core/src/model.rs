//! Records produced by a successful fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build_context::{self, BuildContext};

/// Version-level facts about a fetched module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_path: String,
    pub version: String,
    pub commit_time: Option<DateTime<Utc>>,
    /// The archive carried a module definition file.
    pub has_go_mod: bool,
    /// Path declared by the module definition file, when present.
    pub declared_path: Option<String>,
    /// Some packages could not be processed.
    pub incomplete: bool,
    pub deprecated: bool,
    pub deprecation_comment: Option<String>,
    pub retracted: bool,
    pub retraction_rationale: Option<String>,
}

impl ModuleInfo {
    pub fn new(module_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            version: version.into(),
            commit_time: None,
            has_go_mod: false,
            declared_path: None,
            incomplete: false,
            deprecated: false,
            deprecation_comment: None,
            retracted: false,
            retraction_rationale: None,
        }
    }
}

/// A fetched module version and its packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub info: ModuleInfo,
    pub packages: Vec<Package>,
}

impl Module {
    pub fn module_path(&self) -> &str {
        &self.info.module_path
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Full import path.
    pub path: String,
    pub name: String,
    pub synopsis: String,
    pub documentation: Vec<Documentation>,
}

impl Package {
    /// Documentation for the best registered context matching `query`.
    pub fn documentation_for(&self, query: &BuildContext) -> Option<&Documentation> {
        let best = build_context::select_best(
            self.documentation.iter().map(|d| &d.build_context),
            query,
        )?;
        self.documentation.iter().find(|d| &d.build_context == best)
    }
}

/// Rendered documentation for one build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub build_context: BuildContext,
    pub synopsis: String,
    pub contents: String,
}
