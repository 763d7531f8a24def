//! Bounded map with least-frequently-used eviction
//!
//! Every read or write through `get`/`get_mut`/`insert` counts as an access.
//! When an insert of a new key would exceed the capacity, the entry with the
//! lowest access count is evicted first, ties going to the entry touched
//! longest ago. A capacity of 0 disables the map: inserts are dropped and
//! every lookup misses.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct LfuEntry<V> {
    value: V,
    frequency: u64,
    /// Logical clock value of the last access
    last_access: u64,
}

/// LFU-bounded map
#[derive(Debug, Clone)]
pub struct LfuMap<K, V> {
    entries: HashMap<K, LfuEntry<V>>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl<K, V> LfuMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity,
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) of `get`/`get_mut` so far
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Read without counting an access
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_mut(key).map(|v| &*v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                entry.frequency += 1;
                entry.last_access = clock;
                Some(&mut entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert or replace `key`
    ///
    /// Returns the key evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }
        self.clock += 1;
        let clock = self.clock;

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            entry.frequency += 1;
            entry.last_access = clock;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict()
        } else {
            None
        };

        self.entries.insert(
            key,
            LfuEntry {
                value,
                frequency: 1,
                last_access: clock,
            },
        );
        evicted
    }

    /// Insert only when the key is absent; returns whether it was inserted
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        if !self.is_enabled() || self.entries.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drop every entry for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        self.entries.retain(|k, e| keep(k, &e.value));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|e| &e.value)
    }

    fn evict(&mut self) -> Option<K> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.frequency, e.last_access))
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&victim);
        Some(victim)
    }
}
