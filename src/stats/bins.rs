//! Rotating time-bin history for windowed counters.
//!
//! Windowed counters accumulate in their flat cell for the length of one bin.
//! Each tick moves that accumulation into the bin under the cursor (resetting
//! the flat cell), evicts whatever the bin held before, and advances the
//! cursor. An increment racing a tick lands in either the closing bin or the
//! next one; the windowed totals are eventually consistent.

use super::counter::ShardStats;
use super::list::StatName;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Bin history of one shard.
pub struct BinStore {
    bin_duration: Duration,
    num_bins: usize,
    /// Indexed by counter; empty for counters that are not binned.
    bins: Box<[Box<[AtomicU64]>]>,
    /// Sum of each counter's bins, maintained on rotation.
    within_window: Box<[AtomicU64]>,
    cursor: AtomicUsize,
    num_bins_used: AtomicUsize,
}

impl BinStore {
    pub fn new(num_bins: usize, bin_duration: Duration) -> Self {
        let num_bins = num_bins.max(1);
        let bins = StatName::ALL
            .iter()
            .map(|stat| {
                let len = if stat.is_binned() { num_bins } else { 0 };
                (0..len).map(|_| AtomicU64::new(0)).collect()
            })
            .collect();
        let within_window = StatName::ALL.iter().map(|_| AtomicU64::new(0)).collect();

        Self {
            bin_duration,
            num_bins,
            bins,
            within_window,
            cursor: AtomicUsize::new(0),
            num_bins_used: AtomicUsize::new(0),
        }
    }

    pub fn bin_duration(&self) -> Duration {
        self.bin_duration
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Number of bins populated since start, capped at the window size.
    pub fn num_bins_used(&self) -> usize {
        self.num_bins_used.load(Ordering::Acquire)
    }

    /// Close the current bin for every binned counter and advance.
    ///
    /// Callers serialize rotations through the shard's stats lock.
    pub fn rotate(&self, stats: &ShardStats) {
        let cursor = self.cursor.load(Ordering::Relaxed);

        for stat in StatName::ALL.iter().copied().filter(|s| s.is_binned()) {
            let idx = stat.index();
            let value = stats.swap_uint64(stat, 0);
            let evicted = self.bins[idx][cursor].swap(value, Ordering::Relaxed);
            self.within_window[idx].fetch_add(value, Ordering::Relaxed);
            self.within_window[idx].fetch_sub(evicted, Ordering::Relaxed);
        }

        self.cursor
            .store((cursor + 1) % self.num_bins, Ordering::Relaxed);
        let used = (self.num_bins_used.load(Ordering::Relaxed) + 1).min(self.num_bins);
        self.num_bins_used.store(used, Ordering::Release);
    }

    /// Events recorded for `stat` over the populated part of the window.
    pub fn within_window(&self, stat: StatName) -> u64 {
        self.within_window[stat.index()].load(Ordering::Relaxed)
    }

    /// Value of one bin, or 0 for counters without history.
    pub fn bin(&self, stat: StatName, idx: usize) -> u64 {
        self.bins[stat.index()]
            .get(idx)
            .map(|b| b.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Seconds covered by `bins` bins.
    pub fn span_secs(&self, bins: usize) -> f64 {
        bins as f64 * self.bin_duration.as_secs_f64()
    }

    /// Average rate of `stat` on this shard over the populated window.
    ///
    /// Returns 0 until the first bin has closed.
    pub fn rate(&self, stat: StatName) -> f64 {
        let used = self.num_bins_used();
        if used == 0 {
            return 0.0;
        }
        let span = self.span_secs(used);
        if span == 0.0 {
            return 0.0;
        }
        self.within_window(stat) as f64 / span
    }
}
