//! Per-process spatial cache: the most recent perceived element list, keyed by pid, with a
//! layout fingerprint, insertion timestamp, dirty flag, and the `max_elements` it was built
//! for (spec §3, §4.9).
//!
//! Grounded on `original_source/nexus/state.py`'s spatial-cache section: TTL 3s, capacity 10
//! processes, oldest-first eviction, dirty-bit invalidation from observer events.

use crate::model::CachedElement;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(3);
const DEFAULT_CAPACITY: usize = 10;

struct Entry {
    elements: Vec<CachedElement>,
    fingerprint: String,
    inserted: Instant,
    dirty: bool,
    max_elements: usize,
}

/// §3 "Spatial-cache entry": process-id -> (stripped element list, fingerprint, timestamp,
/// dirty flag, max-elements the entry was built for).
pub struct SpatialCache {
    entries: Mutex<HashMap<i32, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl SpatialCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// §8 cache-soundness property: a read at time t+Δ returns the cached elements iff
    /// Δ < ttl, the entry is not dirty, and `max_elements` matches what it was built for.
    pub fn get(&self, pid: i32, max_elements: usize) -> Option<(Vec<CachedElement>, String)> {
        let entries = self.entries.lock();
        let entry = entries.get(&pid)?;
        if entry.dirty || entry.max_elements != max_elements || entry.inserted.elapsed() >= self.ttl
        {
            return None;
        }
        Some((entry.elements.clone(), entry.fingerprint.clone()))
    }

    pub fn put(&self, pid: i32, elements: Vec<CachedElement>, fingerprint: String, max_elements: usize) {
        let mut entries = self.entries.lock();
        entries.insert(
            pid,
            Entry {
                elements,
                fingerprint,
                inserted: Instant::now(),
                dirty: false,
                max_elements,
            },
        );
        evict_oldest(&mut entries, self.capacity);
    }

    /// Marks the entry for `pid` dirty (observer events, path-navigation invalidation).
    /// §8: "after invalidate(pid), the next read for pid misses."
    pub fn invalidate(&self, pid: i32) {
        if let Some(entry) = self.entries.lock().get_mut(&pid) {
            entry.dirty = true;
        }
    }

    pub fn invalidate_all(&self) {
        for entry in self.entries.lock().values_mut() {
            entry.dirty = true;
        }
    }
}

impl Default for SpatialCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

fn evict_oldest(entries: &mut HashMap<i32, Entry>, capacity: usize) {
    while entries.len() > capacity {
        if let Some(&oldest_pid) = entries
            .iter()
            .min_by_key(|(_, e)| e.inserted)
            .map(|(pid, _)| pid)
        {
            entries.remove(&oldest_pid);
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(label: &str) -> CachedElement {
        CachedElement {
            role: crate::model::Role::Button,
            raw_role: "AXButton".into(),
            label: label.into(),
            value: None,
            position: Some((0.0, 0.0)),
            size: None,
            enabled: true,
            focused: false,
            source: crate::model::SourceTag::Tree,
            container: None,
        }
    }

    #[test]
    fn miss_on_missing_process() {
        let cache = SpatialCache::default();
        assert!(cache.get(1, 100).is_none());
    }

    #[test]
    fn hit_within_ttl_with_matching_max_elements() {
        let cache = SpatialCache::new(Duration::from_secs(3), 10);
        cache.put(1, vec![element("Save")], "abc123".into(), 100);
        let (elements, fp) = cache.get(1, 100).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(fp, "abc123");
    }

    #[test]
    fn miss_on_mismatched_max_elements() {
        let cache = SpatialCache::new(Duration::from_secs(3), 10);
        cache.put(1, vec![element("Save")], "abc123".into(), 100);
        assert!(cache.get(1, 200).is_none());
    }

    #[test]
    fn miss_after_ttl_expiry() {
        let cache = SpatialCache::new(Duration::from_millis(1), 10);
        cache.put(1, vec![element("Save")], "abc123".into(), 100);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(1, 100).is_none());
    }

    #[test]
    fn invalidate_forces_miss() {
        let cache = SpatialCache::new(Duration::from_secs(3), 10);
        cache.put(1, vec![element("Save")], "abc123".into(), 100);
        cache.invalidate(1);
        assert!(cache.get(1, 100).is_none());
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = SpatialCache::new(Duration::from_secs(3), 2);
        cache.put(1, vec![element("A")], "a".into(), 10);
        std::thread::sleep(Duration::from_millis(5));
        cache.put(2, vec![element("B")], "b".into(), 10);
        std::thread::sleep(Duration::from_millis(5));
        cache.put(3, vec![element("C")], "c".into(), 10);
        assert!(cache.get(1, 10).is_none());
        assert!(cache.get(2, 10).is_some());
        assert!(cache.get(3, 10).is_some());
    }
}
