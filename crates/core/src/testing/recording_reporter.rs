//! Error reporter that records reports for assertions.

use std::sync::Mutex;

use crate::fetch::FetchError;
use crate::report::ErrorReporter;

/// A recorded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReport {
    pub module_path: String,
    pub version: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<RecordedReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<RecordedReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, module_path: &str, version: &str, error: &FetchError) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(RecordedReport {
                module_path: module_path.to_string(),
                version: version.to_string(),
                message: error.to_string(),
            });
        }
    }
}
