//! Bounded, most-recent-first history

use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of records kept in a history
pub const HISTORY_LIMIT: usize = 20;

/// Ring-buffer-like history for inspection
///
/// Newest entries are at the front. Pushing beyond the capacity evicts the
/// oldest entry. Nothing is persisted or replayed.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    #[serde(skip)]
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// History holding at most [`HISTORY_LIMIT`] entries
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend an entry, returning the evicted oldest entry if full
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(entry);
        }
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Copy of the entries, most recent first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T> Default for BoundedHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}
