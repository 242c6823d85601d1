use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One FIFO async lock per widget identifier.
///
/// Waiters on the same key are granted the lock in arrival order; different
/// keys never contend. Entries are dropped once nobody holds or awaits them.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyGuard {
            table: Arc::clone(&self.locks),
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active(&self) -> usize {
        self.locks.lock().len()
    }
}

pub struct KeyGuard {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        drop(self.guard.take());
        // Only the table and this guard still reference the slot.
        if Arc::strong_count(&self.slot) <= 2 {
            table.remove(&self.key);
        }
    }
}
