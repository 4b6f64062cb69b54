//! Keyed queue of deferred work.
//!
//! Editors emit change notifications after an edit has settled rather than
//! synchronously inside it. A [`DeferredQueue`] collects such tasks and
//! hands them out on [`drain`](DeferredQueue::drain). Scheduling a task under
//! a key that is already pending replaces the pending task, so a burst of
//! edits yields one notification carrying the latest state.

use std::hash::Hash;

use indexmap::IndexMap;

/// Pending tasks keyed by `K`, in first-scheduled order.
///
/// # Examples
///
/// ```
/// use form_schema_core::DeferredQueue;
///
/// let mut queue = DeferredQueue::new();
/// queue.schedule("schema", 1);
/// queue.schedule("data", 10);
/// queue.schedule("schema", 2);
///
/// assert_eq!(queue.drain(), vec![2, 10]);
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct DeferredQueue<K, T> {
    pending: IndexMap<K, T>,
}

impl<K, T> Default for DeferredQueue<K, T> {
    fn default() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq, T> DeferredQueue<K, T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` under `key`, replacing a pending task with that key.
    ///
    /// Returns `true` if a pending task was replaced.
    pub fn schedule(&mut self, key: K, task: T) -> bool {
        self.pending.insert(key, task).is_some()
    }

    /// Drops the pending task under `key`, returning it.
    pub fn cancel(&mut self, key: &K) -> Option<T> {
        self.pending.shift_remove(key)
    }

    /// Takes every pending task in order, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|(_, task)| task).collect()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
