//! A destination on one shard.

use super::{DestinationHealth, DestinationState};
use crate::request::ReplyResult;
use crate::stats::{ShardStats, StatName};
use parking_lot::Mutex;
use std::sync::Arc;

/// Weight of a new latency sample in the smoothed average.
const LATENCY_SMOOTHING: f64 = 0.1;

/// Connection-layer view of one destination on one shard.
///
/// State changes keep the shard's `num_servers_*` gauges in step, so a
/// destination counts toward exactly one state gauge for as long as it
/// lives.
pub struct ProxyDestination {
    key: String,
    stats: Arc<ShardStats>,
    health: Mutex<DestinationHealth>,
}

impl ProxyDestination {
    pub(crate) fn new(key: String, stats: Arc<ShardStats>) -> Self {
        stats.incr(StatName::NumServers, 1);
        stats.incr(state_stat(DestinationState::New), 1);
        Self {
            key,
            stats,
            health: Mutex::new(DestinationHealth::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current health.
    pub fn health(&self) -> DestinationHealth {
        self.health.lock().clone()
    }

    pub fn state(&self) -> DestinationState {
        self.health.lock().state
    }

    pub fn set_state(&self, state: DestinationState) {
        let mut health = self.health.lock();
        if health.state == state {
            return;
        }
        self.stats.decr(state_stat(health.state), 1);
        self.stats.incr(state_stat(state), 1);
        health.state = state;
    }

    /// Failure tracker output for this destination.
    pub fn set_tko(&self, hard: bool, soft: bool) {
        let mut health = self.health.lock();
        health.hard_tko = hard;
        health.soft_tko = soft;
    }

    /// Tally one reply received from this destination.
    pub fn record_result(&self, result: ReplyResult) {
        self.health.lock().results[result.index()] += 1;

        self.stats.incr(StatName::CmdOut, 1);
        self.stats.incr(StatName::CmdOutCount, 1);
        if !result.is_error() {
            return;
        }
        self.stats.incr(StatName::ResultError, 1);
        self.stats.incr(StatName::ResultErrorCount, 1);
        let class = match result {
            ReplyResult::ConnectError | ReplyResult::ConnectTimeout => {
                Some((StatName::ResultConnectError, StatName::ResultConnectErrorCount))
            }
            ReplyResult::Timeout => Some((StatName::ResultTimeout, StatName::ResultTimeoutCount)),
            ReplyResult::Tko => Some((StatName::ResultTko, StatName::ResultTkoCount)),
            ReplyResult::LocalError => {
                Some((StatName::ResultLocalError, StatName::ResultLocalErrorCount))
            }
            _ => None,
        };
        if let Some((rate, count)) = class {
            self.stats.incr(rate, 1);
            self.stats.incr(count, 1);
        }
    }

    /// Fold a latency sample into the smoothed average.
    pub fn record_latency(&self, latency_us: f64) {
        let mut health = self.health.lock();
        health.avg_latency_us = Some(match health.avg_latency_us {
            Some(avg) => avg + LATENCY_SMOOTHING * (latency_us - avg),
            None => latency_us,
        });
    }

    /// Record the latest retransmission ratio. Negative samples mean "not
    /// measured" and clear the value.
    pub fn set_retrans_ratio(&self, per_kbyte: f64) {
        let mut health = self.health.lock();
        health.retrans_per_kbyte = if per_kbyte >= 0.0 {
            Some(per_kbyte)
        } else {
            None
        };
    }

    pub fn set_pending(&self, pending: usize) {
        self.health.lock().pending = pending;
        self.stats
            .fetch_max(StatName::DestinationMaxPendingReqs, pending as u64);
    }

    pub fn set_inflight(&self, inflight: usize) {
        self.health.lock().inflight = inflight;
        self.stats
            .fetch_max(StatName::DestinationMaxInflightReqs, inflight as u64);
    }
}

impl Drop for ProxyDestination {
    fn drop(&mut self) {
        let state = self.health.get_mut().state;
        self.stats.decr(state_stat(state), 1);
        self.stats.decr(StatName::NumServers, 1);
    }
}

fn state_stat(state: DestinationState) -> StatName {
    match state {
        DestinationState::New => StatName::NumServersNew,
        DestinationState::Up => StatName::NumServersUp,
        DestinationState::Closed => StatName::NumServersClosed,
        DestinationState::Down => StatName::NumServersDown,
    }
}
