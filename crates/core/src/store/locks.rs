//! Per-module advisory locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// A keyed table of async mutexes, one per module path.
///
/// Entries are created on demand and removed when the last holder or
/// waiter goes away, so the table only contains contended paths.
#[derive(Debug, Clone, Default)]
pub struct ModuleLocks {
    table: LockTable,
}

impl ModuleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `module_path`.
    pub async fn lock(&self, module_path: &str) -> ModuleLock {
        let entry = {
            let mut table = lock_table(&self.table);
            Arc::clone(table.entry(module_path.to_string()).or_default())
        };
        let guard = entry.lock_owned().await;
        ModuleLock {
            module_path: module_path.to_string(),
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of paths currently locked or waited on.
    pub fn len(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_table(
    table: &LockTable,
) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held advisory lock. Released on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as it is dropped"]
pub struct ModuleLock {
    module_path: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl ModuleLock {
    pub fn module_path(&self) -> &str {
        &self.module_path
    }
}

impl Drop for ModuleLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = lock_table(&self.table);
        // Waiters clone the entry under the table lock, so a count of one
        // means nobody else can be holding or waiting.
        if table
            .get(&self.module_path)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            table.remove(&self.module_path);
        }
    }
}
