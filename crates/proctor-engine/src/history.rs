//! Bounded per-track histories.
//!
//! Every detector keeps its rolling window in a [`TrackTable`] keyed by
//! [`TrackKey`]. Entries are created on first observation and live until
//! explicitly evicted.

use std::collections::{HashMap, VecDeque};

use crate::track_key::TrackKey;
use crate::Timestamp;

/// Fixed-capacity FIFO: pushing into a full history drops the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Newest entry.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Consecutive `(older, newer)` pairs, oldest first.
    pub fn pairs(&self) -> impl Iterator<Item = (&T, &T)> {
        self.items.iter().zip(self.items.iter().skip(1))
    }
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_seen: Timestamp,
}

/// Per-track state with last-seen bookkeeping for optional eviction.
#[derive(Debug)]
pub struct TrackTable<V> {
    slots: HashMap<TrackKey, Slot<V>>,
}

impl<V> Default for TrackTable<V> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<V> TrackTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `key`, created with `init` on first observation.
    pub fn touch(&mut self, key: TrackKey, now: Timestamp, init: impl FnOnce() -> V) -> &mut V {
        let slot = self.slots.entry(key).or_insert_with(|| Slot {
            value: init(),
            last_seen: now,
        });
        slot.last_seen = now;
        &mut slot.value
    }

    pub fn get(&self, key: &TrackKey) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop tracks not seen for more than `max_idle` seconds. Returns the count removed.
    pub fn evict_older_than(&mut self, now: Timestamp, max_idle: f64) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| now - slot.last_seen <= max_idle);
        before - self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let mut history = BoundedHistory::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(history.last(), Some(&4));
        assert_eq!(history.pairs().count(), 2);
    }

    #[test]
    fn test_track_table_eviction() {
        let mut table: TrackTable<u32> = TrackTable::new();
        let a = TrackKey::Cell { row: 0, col: 0 };
        let b = TrackKey::Cell { row: 1, col: 1 };

        *table.touch(a, 0.0, || 0) += 1;
        *table.touch(b, 5.0, || 0) += 1;
        *table.touch(a, 6.0, || 0) += 1;

        assert_eq!(table.get(&a), Some(&2));
        assert_eq!(table.evict_older_than(20.0, 14.5), 1);
        assert!(table.contains(&a));
        assert!(!table.contains(&b));
    }
}
