//! Fetch pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::version::FLOATING_POINTERS;

/// Configuration for the fetch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Branch aliases resolved on every fetch so their version-map rows
    /// follow the branch.
    #[serde(default = "default_floating_pointers")]
    pub floating_pointers: Vec<String>,

    /// Invalidate the page cache when a new latest version is stored.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

fn default_floating_pointers() -> Vec<String> {
    FLOATING_POINTERS.iter().map(|p| p.to_string()).collect()
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            floating_pointers: default_floating_pointers(),
            cache_enabled: default_cache_enabled(),
        }
    }
}
