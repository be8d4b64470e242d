//! Per-key async locks
//!
//! Serializes ledger transitions for one (identity, day) inside this
//! process while leaving other keys independent. Entries are dropped once
//! no guard or waiter holds them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        KeyGuard {
            key: Some(key),
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held while a key is locked
pub struct KeyGuard<K: Eq + Hash + Clone> {
    key: Option<K>,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Mutex<HashMap<K, Slot>>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        // Release the async lock before inspecting the map
        drop(self.guard.take());

        if let Some(key) = self.key.take() {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Map entry is the only remaining reference: nobody waits on it
            if slots.get(&key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(&key);
            }
        }
    }
}
