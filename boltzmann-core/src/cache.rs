//! Keyed at-most-once memoisation shared between threads.

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type Slot<V> = Arc<OnceLock<Result<V>>>;

/// A grow-only map whose entries are computed at most once.
///
/// Concurrent callers asking for the same key block on the first
/// computation and then share its result, error included.
#[derive(Debug)]
pub struct Memo<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Memo {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy, V: Clone> Memo<K, V> {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value for `key`, running `init` if no thread has yet. Errors are
    /// cached like values.
    pub fn get_or_try_init(&self, key: K, init: impl FnOnce() -> Result<V>) -> Result<V> {
        // The map lock is held only to find the slot, never during `init`.
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.get_or_init(init).clone()
    }

    /// The value for `key`, if it has been computed successfully.
    pub fn get(&self, key: K) -> Option<V> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(&key)?.get()? {
            Ok(value) => Some(value.clone()),
            Err(_) => None,
        }
    }

    /// Whether `key` has finished initialising.
    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Keys with a finished computation, successful or not.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
