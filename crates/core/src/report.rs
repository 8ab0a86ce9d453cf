//! Error reporting for internal failures.

use tracing::error;

use crate::fetch::FetchError;

/// Receives fetch failures that indicate a bug or an outage rather than a
/// problem with the module.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, module_path: &str, version: &str, error: &FetchError);
}

/// Reports through the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, module_path: &str, version: &str, error: &FetchError) {
        error!(
            module_path,
            version,
            status = %error.status(),
            error = %error,
            "Internal fetch failure"
        );
    }
}
