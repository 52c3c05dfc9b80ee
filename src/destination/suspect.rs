//! Destinations the failure detector currently distrusts.

use ahash::AHashMap;
use parking_lot::RwLock;

/// Why a destination is suspect and how often it has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspectStatus {
    /// `true` when marked TKO, `false` when merely down.
    pub is_tko: bool,
    pub num_failures: usize,
}

/// Read-only view of the failure detector's suspect set.
pub trait SuspectRegistry: Send + Sync {
    /// Every suspect destination with its status.
    fn suspect_servers(&self) -> Vec<(String, SuspectStatus)>;

    fn suspect_count(&self) -> usize {
        self.suspect_servers().len()
    }
}

/// In-memory suspect set, fed by whatever tracks destination failures.
#[derive(Default)]
pub struct SuspectSet {
    servers: RwLock<AHashMap<String, SuspectStatus>>,
}

impl SuspectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, key: &str, is_tko: bool, num_failures: usize) {
        self.servers.write().insert(
            key.to_string(),
            SuspectStatus {
                is_tko,
                num_failures,
            },
        );
    }

    pub fn clear(&self, key: &str) {
        self.servers.write().remove(key);
    }
}

impl SuspectRegistry for SuspectSet {
    fn suspect_servers(&self) -> Vec<(String, SuspectStatus)> {
        let mut servers: Vec<_> = self
            .servers
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        servers.sort_by(|a, b| a.0.cmp(&b.0));
        servers
    }

    fn suspect_count(&self) -> usize {
        self.servers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear() {
        let set = SuspectSet::new();
        set.mark("b:11211", false, 2);
        set.mark("a:11211", true, 5);
        assert_eq!(set.suspect_count(), 2);

        let servers = set.suspect_servers();
        assert_eq!(servers[0].0, "a:11211");
        assert!(servers[0].1.is_tko);
        assert_eq!(servers[1].1.num_failures, 2);

        set.clear("a:11211");
        assert_eq!(set.suspect_count(), 1);
    }
}
