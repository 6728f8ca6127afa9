//! Per-interface neighbor cache
//!
//! Values are copied out on lookup and must be written back with
//! [`NeighborCache::upsert`] after they are changed. A lookup never creates an
//! entry.

use crate::entry::NeighborEntry;
use crate::types::NeighborKey;

#[cfg(not(feature = "perf-fxhash"))]
use std::collections::HashMap;

#[cfg(feature = "perf-fxhash")]
use rustc_hash::FxHashMap as HashMap;

/// Neighbor entries keyed by (IP, MAC)
#[derive(Debug, Default, Clone)]
pub struct NeighborCache {
    entries: HashMap<NeighborKey, NeighborEntry>,
}

impl NeighborCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entry stored under `key`
    pub fn lookup(&self, key: &NeighborKey) -> Option<NeighborEntry> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &NeighborKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite, returning the previous value
    pub fn upsert(&mut self, entry: NeighborEntry) -> Option<NeighborEntry> {
        self.entries.insert(*entry.key(), entry)
    }

    pub fn delete(&mut self, key: &NeighborKey) -> Option<NeighborEntry> {
        self.entries.remove(key)
    }

    /// Remove and return every entry
    pub fn drain(&mut self) -> Vec<NeighborEntry> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MacAddress, NeighborState};

    fn key(ip: &str, last: u8) -> NeighborKey {
        NeighborKey::new(ip.parse().unwrap(), MacAddress([0xaa, 0xbb, 0xcc, 0, 0, last]))
    }

    #[test]
    fn test_empty_cache() {
        let cache = NeighborCache::new();
        assert!(cache.is_empty());
        assert!(cache.lookup(&key("10.0.0.1", 1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_returns_copy() {
        let mut cache = NeighborCache::new();
        let k = key("2001:db8::1", 1);
        cache.upsert(NeighborEntry::learned(k, 1, true));

        let mut copy = cache.lookup(&k).unwrap();
        copy.solicitation_received();
        assert_eq!(cache.lookup(&k).unwrap().state(), NeighborState::Reachable);

        cache.upsert(copy);
        assert_eq!(cache.lookup(&k).unwrap().state(), NeighborState::Stale);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_ip_different_mac_kept_apart() {
        let mut cache = NeighborCache::new();
        cache.upsert(NeighborEntry::learned(key("2001:db8::1", 1), 1, true));
        cache.upsert(NeighborEntry::learned(key("2001:db8::1", 2), 1, false));
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.lookup(&key("2001:db8::1", 2)).unwrap().state(),
            NeighborState::Incomplete
        );
    }

    #[test]
    fn test_delete_and_drain() {
        let mut cache = NeighborCache::new();
        cache.upsert(NeighborEntry::learned(key("2001:db8::1", 1), 1, true));
        cache.upsert(NeighborEntry::learned(key("2001:db8::2", 2), 1, true));

        assert!(cache.delete(&key("2001:db8::1", 1)).is_some());
        assert!(cache.delete(&key("2001:db8::1", 1)).is_none());
        assert_eq!(cache.drain().len(), 1);
        assert!(cache.is_empty());
    }
}
