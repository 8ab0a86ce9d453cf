//! Outcome classification for fetch attempts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome of one fetch attempt. The set is closed: callers match on it
/// exhaustively to decide between deleting data, retrying, or keeping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    /// Fetched, but some packages failed to process.
    PartialSuccess,
    NotFound,
    /// Blocked by an administrative exclusion.
    Excluded,
    /// The module declares a different path than the one requested.
    AlternativeModule,
    BadRequest,
    TimedOut,
    InternalError,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Success,
        Status::PartialSuccess,
        Status::NotFound,
        Status::Excluded,
        Status::AlternativeModule,
        Status::BadRequest,
        Status::TimedOut,
        Status::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::PartialSuccess => "partial_success",
            Status::NotFound => "not_found",
            Status::Excluded => "excluded",
            Status::AlternativeModule => "alternative_module",
            Status::BadRequest => "bad_request",
            Status::TimedOut => "timed_out",
            Status::InternalError => "internal_error",
        }
    }

    /// Module data was stored.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success | Status::PartialSuccess)
    }

    /// Terminal failure caused by the module itself. Existing data for the
    /// version is deleted.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Status::NotFound | Status::Excluded | Status::AlternativeModule | Status::BadRequest
        )
    }

    /// Transient failure; existing data is kept and the attempt may be
    /// repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Status::TimedOut | Status::InternalError)
    }

    /// HTTP status code reported to task-service callers.
    pub fn http_code(&self) -> u16 {
        match self {
            Status::Success | Status::PartialSuccess => 200,
            Status::NotFound => 404,
            Status::Excluded => 403,
            Status::AlternativeModule => 409,
            Status::BadRequest => 400,
            Status::TimedOut => 504,
            Status::InternalError => 500,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}
