//! Page cache invalidation.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// A cache of rendered pages keyed by URL path.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Removes every entry whose key starts with `prefix`. Returns the
    /// number of entries removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Removes the entry at exactly `key`. Returns whether one existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Invalidates the page at `path` and every page below it, leaving
/// siblings that merely share a string prefix (`/a/mod` vs `/a/modern`).
pub async fn invalidate_path(cache: &dyn Cache, path: &str) -> Result<usize, CacheError> {
    let exact = cache.delete(path).await?;
    let deeper = cache
        .delete_prefix(&format!("{}/", path.trim_end_matches('/')))
        .await?;
    Ok(deeper + usize::from(exact))
}
