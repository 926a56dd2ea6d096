use dashmap::DashMap;
use std::time::{Duration, Instant};

// Above this many entries an insert also sweeps expired ones.
const SWEEP_THRESHOLD: usize = 512;
// Hard cap; once reached, the oldest entries are evicted even if still fresh.
const DEFAULT_MAX_ENTRIES: usize = 4096;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Short-lived cache for identical analyzer queries.
///
/// Entries are keyed by the canonical query form, so requests with different filters,
/// sort or page never see each other's results. A zero TTL disables caching.
pub struct QueryCache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if self.ttl.is_zero() {
            return None;
        }

        // The read guard must be dropped before the map is mutated below.
        let fresh = {
            let entry = self.entries.get(key)?;
            (entry.stored_at.elapsed() < self.ttl).then(|| entry.value.clone())
        };

        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, e| e.stored_at.elapsed() >= self.ttl);
        }
        fresh
    }

    pub fn insert(&self, key: String, value: V) {
        if self.ttl.is_zero() {
            return;
        }

        if self.entries.len() >= SWEEP_THRESHOLD.min(self.max_entries) {
            let ttl = self.ttl;
            self.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        }

        while self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            // The iterator holds shard locks; collect the key before removing.
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.stored_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(k) => {
                    self.entries.remove(&k);
                }
                None => break,
            }
        }

        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
