//! Backend destinations as seen by one shard.
//!
//! The connection layer owns the per-shard [`ProxyDestination`] objects and
//! updates them as requests complete; this crate only reads their
//! [`DestinationHealth`] snapshots when building reports.

mod map;
mod proxy;
mod suspect;

pub use map::DestinationMap;
pub use proxy::ProxyDestination;
pub use suspect::{SuspectRegistry, SuspectSet, SuspectStatus};

use crate::request::ReplyResult;
use std::fmt;

/// Lifecycle state of a destination's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DestinationState {
    #[default]
    New,
    Up,
    Closed,
    Down,
}

impl DestinationState {
    pub const ALL: [DestinationState; 4] = [
        DestinationState::New,
        DestinationState::Up,
        DestinationState::Closed,
        DestinationState::Down,
    ];

    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DestinationState::New => "new",
            DestinationState::Up => "up",
            DestinationState::Closed => "closed",
            DestinationState::Down => "down",
        }
    }
}

impl fmt::Display for DestinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health of one destination on one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationHealth {
    pub state: DestinationState,
    pub hard_tko: bool,
    pub soft_tko: bool,
    /// Reply count per result kind, indexed by [`ReplyResult::index`].
    pub results: [u64; ReplyResult::COUNT],
    /// Smoothed latency in microseconds; absent until the first sample.
    pub avg_latency_us: Option<f64>,
    /// Retransmissions per kilobyte; absent until measured, never negative.
    pub retrans_per_kbyte: Option<f64>,
    pub pending: usize,
    pub inflight: usize,
}

impl Default for DestinationHealth {
    fn default() -> Self {
        Self {
            state: DestinationState::New,
            hard_tko: false,
            soft_tko: false,
            results: [0; ReplyResult::COUNT],
            avg_latency_us: None,
            retrans_per_kbyte: None,
            pending: 0,
            inflight: 0,
        }
    }
}

impl DestinationHealth {
    pub fn result_count(&self, result: ReplyResult) -> u64 {
        self.results[result.index()]
    }
}
