//! Build contexts: the (platform, architecture) pairs documentation is
//! rendered for.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A target platform and architecture. Empty fields act as wildcards when
/// the context is used as a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
}

impl BuildContext {
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
        }
    }

    /// Pseudo-context for documentation identical on every target.
    pub fn all() -> Self {
        Self::new("all", "all")
    }

    /// Reports whether `concrete` satisfies this query.
    pub fn matches(&self, concrete: &BuildContext) -> bool {
        (self.goos.is_empty() || self.goos == concrete.goos)
            && (self.goarch.is_empty() || self.goarch == concrete.goarch)
    }

    /// Position in the registry, if registered.
    pub fn position(&self) -> Option<usize> {
        BUILD_CONTEXTS
            .iter()
            .position(|(goos, goarch)| *goos == self.goos && *goarch == self.goarch)
    }

    pub fn is_registered(&self) -> bool {
        self.position().is_some()
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.goos, self.goarch)
    }
}

/// Registered contexts, in preference order.
pub const BUILD_CONTEXTS: &[(&str, &str)] = &[
    ("all", "all"),
    ("linux", "amd64"),
    ("windows", "amd64"),
    ("darwin", "amd64"),
    ("js", "wasm"),
];

/// Registered contexts as owned values.
pub fn build_contexts() -> Vec<BuildContext> {
    BUILD_CONTEXTS
        .iter()
        .map(|(goos, goarch)| BuildContext::new(*goos, *goarch))
        .collect()
}

/// Orders contexts by registry position. Unregistered contexts sort last
/// and compare equal to each other, so sorting is stable.
pub fn compare(a: &BuildContext, b: &BuildContext) -> Ordering {
    let pos = |c: &BuildContext| c.position().unwrap_or(usize::MAX);
    pos(a).cmp(&pos(b))
}

/// Picks the best-ranked context among `available` that matches `query`.
pub fn select_best<'a, I>(available: I, query: &BuildContext) -> Option<&'a BuildContext>
where
    I: IntoIterator<Item = &'a BuildContext>,
{
    available
        .into_iter()
        .filter(|c| query.matches(c))
        .min_by(|a, b| compare(a, b))
}
