//! In-process cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Cache, CacheError};

/// Ordered in-memory cache; prefix deletion is a range scan.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let doomed: Vec<String> = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        debug!(prefix, removed = doomed.len(), "Invalidated cache prefix");
        Ok(doomed.len())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = MemoryCache::new();
        cache.put("/example.com/mod", b"a".to_vec()).await;
        cache.put("/example.com/mod/pkg", b"b".to_vec()).await;
        cache.put("/example.com/mod/v2", b"c".to_vec()).await;
        cache.put("/example.com/other", b"d".to_vec()).await;

        let removed = cache.delete_prefix("/example.com/mod").await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("/example.com/other").await, Some(b"d".to_vec()));
        assert!(cache.get("/example.com/mod/pkg").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_path_spares_string_siblings() {
        let cache = MemoryCache::new();
        cache.put("/example.com/mod", b"a".to_vec()).await;
        cache.put("/example.com/mod/pkg", b"b".to_vec()).await;
        cache.put("/example.com/modern", b"c".to_vec()).await;
        cache.put("/example.com/modern/pkg", b"d".to_vec()).await;

        let removed = crate::cache::invalidate_path(&cache, "/example.com/mod")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get("/example.com/mod").await.is_none());
        assert!(cache.get("/example.com/mod/pkg").await.is_none());
        assert_eq!(cache.get("/example.com/modern").await, Some(b"c".to_vec()));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_prefix() {
        let cache = MemoryCache::new();
        cache.put("/a", Vec::new()).await;
        assert_eq!(cache.delete_prefix("/b").await.unwrap(), 0);
        assert!(!cache.is_empty().await);
    }
}
