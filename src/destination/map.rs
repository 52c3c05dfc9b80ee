//! Per-shard destination table.

use super::{DestinationHealth, ProxyDestination};
use crate::stats::ShardStats;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// All destinations one shard talks to, keyed by destination identity.
pub struct DestinationMap {
    stats: Arc<ShardStats>,
    destinations: RwLock<AHashMap<String, Arc<ProxyDestination>>>,
}

impl DestinationMap {
    pub fn new(stats: Arc<ShardStats>) -> Self {
        Self {
            stats,
            destinations: RwLock::new(AHashMap::new()),
        }
    }

    /// Get the destination for `key`, creating it if needed.
    pub fn emplace(&self, key: &str) -> Arc<ProxyDestination> {
        if let Some(dst) = self.destinations.read().get(key) {
            return dst.clone();
        }
        let mut destinations = self.destinations.write();
        destinations
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(ProxyDestination::new(key.to_string(), self.stats.clone()))
            })
            .clone()
    }

    pub fn find(&self, key: &str) -> Option<Arc<ProxyDestination>> {
        self.destinations.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<ProxyDestination>> {
        self.destinations.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.destinations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.read().is_empty()
    }

    /// Visit a snapshot of every destination's health.
    ///
    /// The table lock is held only while the entry list is copied, so the
    /// visitor may run while the connection layer keeps mutating both the
    /// table and the destinations.
    pub fn foreach_destination_synced<F>(&self, mut f: F)
    where
        F: FnMut(&str, &DestinationHealth),
    {
        let entries: Vec<Arc<ProxyDestination>> =
            self.destinations.read().values().cloned().collect();
        for dst in entries {
            let health = dst.health();
            f(dst.key(), &health);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatName;

    #[test]
    fn test_emplace_is_idempotent() {
        let stats = Arc::new(ShardStats::new());
        let map = DestinationMap::new(stats.clone());
        let a = map.emplace("a:11211");
        let b = map.emplace("a:11211");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 1);
        assert_eq!(stats.get_uint64(StatName::NumServers), 1);
    }

    #[test]
    fn test_remove_releases_gauges() {
        let stats = Arc::new(ShardStats::new());
        let map = DestinationMap::new(stats.clone());
        map.emplace("a:11211");
        map.emplace("b:11211");
        assert_eq!(stats.get_uint64(StatName::NumServers), 2);
        map.remove("a:11211");
        assert_eq!(stats.get_uint64(StatName::NumServers), 1);
        assert!(map.find("a:11211").is_none());
    }

    #[test]
    fn test_foreach_allows_mutation() {
        let map = DestinationMap::new(Arc::new(ShardStats::new()));
        map.emplace("a:11211");
        map.emplace("b:11211");

        let mut seen = Vec::new();
        map.foreach_destination_synced(|key, _| {
            // would deadlock if the table lock were still held
            map.emplace("c:11211");
            seen.push(key.to_string());
        });
        seen.sort();
        assert_eq!(seen, vec!["a:11211", "b:11211"]);
        assert_eq!(map.len(), 3);
    }
}
