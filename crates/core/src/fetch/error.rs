//! Error types for the fetch pipeline.

use thiserror::Error;

use super::Status;
use crate::cache::CacheError;
use crate::origin::OriginError;
use crate::store::StoreError;

/// Errors that can occur while fetching a module version.
///
/// Every variant maps to exactly one [`Status`]; wrapping with
/// [`FetchResultExt::context`] adds a message without changing it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The module or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The module or version is administratively excluded.
    #[error("excluded: {0}")]
    Excluded(String),

    /// The module declares a different path than the one requested.
    #[error("module path mismatch: requested {requested}, module declares {declared}")]
    AlternativeModule { requested: String, declared: String },

    /// The request itself is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The origin did not answer in time.
    #[error("origin timed out: {0}")]
    OriginTimedOut(String),

    /// The admission controller refused the work.
    #[error("shedding load: cost {cost} exceeds remaining budget")]
    SheddingLoad { cost: u64 },

    /// Any other origin failure.
    #[error("origin error: {0}")]
    Origin(OriginError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("internal error: {0}")]
    Internal(String),

    /// A lower-level error with added context.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classifies the error, looking through any context layers.
    pub fn status(&self) -> Status {
        match self {
            FetchError::NotFound(_) => Status::NotFound,
            FetchError::Excluded(_) => Status::Excluded,
            FetchError::AlternativeModule { .. } => Status::AlternativeModule,
            FetchError::BadRequest(_) => Status::BadRequest,
            FetchError::OriginTimedOut(_) => Status::TimedOut,
            FetchError::SheddingLoad { .. }
            | FetchError::Origin(_)
            | FetchError::Store(_)
            | FetchError::Cache(_)
            | FetchError::Internal(_) => Status::InternalError,
            FetchError::Context { source, .. } => source.status(),
        }
    }

    /// The innermost error.
    pub fn root(&self) -> &FetchError {
        let mut err = self;
        while let FetchError::Context { source, .. } = err {
            err = source;
        }
        err
    }
}

impl From<OriginError> for FetchError {
    fn from(err: OriginError) -> Self {
        match err {
            OriginError::NotFound(msg) => FetchError::NotFound(msg),
            OriginError::TimedOut(msg) => FetchError::OriginTimedOut(msg),
            OriginError::BadRequest(msg) => FetchError::BadRequest(msg),
            other => FetchError::Origin(other),
        }
    }
}

/// Adds context to fetch results while keeping their classification.
pub trait FetchResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, FetchError>;

    fn with_context<F>(self, f: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> String;
}

impl<T, E> FetchResultExt<T> for Result<T, E>
where
    E: Into<FetchError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, FetchError> {
        self.map_err(|e| FetchError::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| FetchError::Context {
            context: f(),
            source: Box::new(e.into()),
        })
    }
}
