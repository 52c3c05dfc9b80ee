//! Per-shard counter registry.
//!
//! Each shard owns one [`ShardStats`], a fixed array of typed cells built
//! from the static counter table. Numeric cells are atomics so that reports
//! issued from another shard's worker can read them without a lock, and so
//! that increments stay safe when a collaborator calls in from another
//! thread. String cells hold process metadata and are immutable.

use super::list::{Initial, STATS, StatName};
use super::value::StatValue;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

enum Cell {
    String(&'static str),
    Uint64(AtomicU64),
    Int64(AtomicI64),
    /// f64 stored as its bit pattern.
    Double(AtomicU64),
}

impl Cell {
    fn new(initial: Initial) -> Self {
        match initial {
            Initial::String(s) => Cell::String(s),
            Initial::Uint64(v) => Cell::Uint64(AtomicU64::new(v)),
            Initial::Int64(v) => Cell::Int64(AtomicI64::new(v)),
            Initial::Double(v) => Cell::Double(AtomicU64::new(v.to_bits())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Cell::String(_) => "string",
            Cell::Uint64(_) => "uint64",
            Cell::Int64(_) => "int64",
            Cell::Double(_) => "double",
        }
    }
}

/// The counters of one shard.
pub struct ShardStats {
    cells: Box<[Cell]>,
}

impl Default for ShardStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardStats {
    /// Create a registry with every counter at its table value.
    pub fn new() -> Self {
        let cells = STATS.iter().map(|def| Cell::new(def.initial)).collect();
        Self { cells }
    }

    /// Put every numeric counter back to its table value.
    pub fn reset(&self) {
        for (cell, def) in self.cells.iter().zip(STATS.iter()) {
            match (cell, def.initial) {
                (Cell::Uint64(a), Initial::Uint64(v)) => a.store(v, Ordering::Relaxed),
                (Cell::Int64(a), Initial::Int64(v)) => a.store(v, Ordering::Relaxed),
                (Cell::Double(a), Initial::Double(v)) => a.store(v.to_bits(), Ordering::Relaxed),
                _ => {}
            }
        }
    }

    #[inline]
    fn cell(&self, stat: StatName) -> &Cell {
        &self.cells[stat.index()]
    }

    #[cold]
    fn mismatch(&self, stat: StatName, expected: &str) -> ! {
        panic!(
            "stat {} is {}, not {}",
            stat.name(),
            self.cell(stat).kind(),
            expected
        );
    }

    /// Atomically add `delta` to an integer counter.
    #[inline]
    pub fn incr(&self, stat: StatName, delta: u64) {
        match self.cell(stat) {
            Cell::Uint64(a) => {
                a.fetch_add(delta, Ordering::Relaxed);
            }
            Cell::Int64(a) => {
                a.fetch_add(delta as i64, Ordering::Relaxed);
            }
            _ => self.mismatch(stat, "an integer"),
        }
    }

    /// Atomically subtract `delta` from an integer counter.
    #[inline]
    pub fn decr(&self, stat: StatName, delta: u64) {
        match self.cell(stat) {
            Cell::Uint64(a) => {
                a.fetch_sub(delta, Ordering::Relaxed);
            }
            Cell::Int64(a) => {
                a.fetch_sub(delta as i64, Ordering::Relaxed);
            }
            _ => self.mismatch(stat, "an integer"),
        }
    }

    /// Raise a uint64 counter to `value` if it is currently lower.
    #[inline]
    pub fn fetch_max(&self, stat: StatName, value: u64) {
        match self.cell(stat) {
            Cell::Uint64(a) => {
                a.fetch_max(value, Ordering::Relaxed);
            }
            _ => self.mismatch(stat, "uint64"),
        }
    }

    pub fn set_uint64(&self, stat: StatName, value: u64) {
        match self.cell(stat) {
            Cell::Uint64(a) => a.store(value, Ordering::Relaxed),
            _ => self.mismatch(stat, "uint64"),
        }
    }

    pub fn get_uint64(&self, stat: StatName) -> u64 {
        match self.cell(stat) {
            Cell::Uint64(a) => a.load(Ordering::Relaxed),
            _ => self.mismatch(stat, "uint64"),
        }
    }

    pub fn get_int64(&self, stat: StatName) -> i64 {
        match self.cell(stat) {
            Cell::Int64(a) => a.load(Ordering::Relaxed),
            _ => self.mismatch(stat, "int64"),
        }
    }

    pub fn set_double(&self, stat: StatName, value: f64) {
        match self.cell(stat) {
            Cell::Double(a) => a.store(value.to_bits(), Ordering::Relaxed),
            _ => self.mismatch(stat, "double"),
        }
    }

    pub fn get_double(&self, stat: StatName) -> f64 {
        match self.cell(stat) {
            Cell::Double(a) => f64::from_bits(a.load(Ordering::Relaxed)),
            _ => self.mismatch(stat, "double"),
        }
    }

    /// Swap a uint64 counter for `value`, returning what it held.
    pub(crate) fn swap_uint64(&self, stat: StatName, value: u64) -> u64 {
        match self.cell(stat) {
            Cell::Uint64(a) => a.swap(value, Ordering::AcqRel),
            _ => self.mismatch(stat, "uint64"),
        }
    }

    /// Read any counter as a report value.
    pub fn value(&self, stat: StatName) -> StatValue {
        match self.cell(stat) {
            Cell::String(s) => StatValue::String((*s).to_string()),
            Cell::Uint64(a) => StatValue::Uint64(a.load(Ordering::Relaxed)),
            Cell::Int64(a) => StatValue::Int64(a.load(Ordering::Relaxed)),
            Cell::Double(a) => StatValue::Double(f64::from_bits(a.load(Ordering::Relaxed))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::list::PACKAGE_STRING;
    use std::sync::Arc;

    #[test]
    fn test_initialized_from_table() {
        let stats = ShardStats::new();
        assert_eq!(
            stats.value(StatName::Version),
            StatValue::String(PACKAGE_STRING.to_string())
        );
        assert_eq!(stats.get_uint64(StatName::RequestReplied), 0);
        assert_eq!(stats.get_int64(StatName::Pid), 0);
        assert_eq!(stats.get_double(StatName::DurationUs), 0.0);
    }

    #[test]
    fn test_incr_decr() {
        let stats = ShardStats::new();
        stats.incr(StatName::NumServers, 3);
        stats.decr(StatName::NumServers, 1);
        assert_eq!(stats.get_uint64(StatName::NumServers), 2);
    }

    #[test]
    fn test_fetch_max() {
        let stats = ShardStats::new();
        stats.fetch_max(StatName::DestinationMaxPendingReqs, 7);
        stats.fetch_max(StatName::DestinationMaxPendingReqs, 3);
        assert_eq!(stats.get_uint64(StatName::DestinationMaxPendingReqs), 7);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let stats = ShardStats::new();
        stats.incr(StatName::RequestSent, 10);
        stats.set_double(StatName::DurationUs, 2.5);
        stats.reset();
        stats.reset();
        assert_eq!(stats.get_uint64(StatName::RequestSent), 0);
        assert_eq!(stats.get_double(StatName::DurationUs), 0.0);
    }

    #[test]
    fn test_concurrent_incr() {
        let stats = Arc::new(ShardStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.incr(StatName::RequestReplied, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.get_uint64(StatName::RequestReplied), 4000);
    }

    #[test]
    #[should_panic(expected = "stat version is string, not uint64")]
    fn test_type_mismatch_is_fatal() {
        let stats = ShardStats::new();
        stats.get_uint64(StatName::Version);
    }

    #[test]
    #[should_panic(expected = "not an integer")]
    fn test_incr_double_is_fatal() {
        let stats = ShardStats::new();
        stats.incr(StatName::DurationUs, 1);
    }
}
