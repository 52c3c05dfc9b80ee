//! Per-destination health digests merged from every shard's view.

use super::value::format_g;
use crate::destination::{DestinationHealth, DestinationState, SuspectRegistry};
use crate::request::ReplyResult;
use crate::shard::Shard;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One destination's health, accumulated across shards.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationDigest {
    states: [u64; DestinationState::COUNT],
    results: [u64; ReplyResult::COUNT],
    hard_tko: bool,
    soft_tko: bool,
    latency_sum_us: f64,
    latency_samples: usize,
    retrans_sum: f64,
    retrans_min: f64,
    retrans_max: f64,
    retrans_samples: usize,
    pending: u64,
    inflight: u64,
}

impl Default for DestinationDigest {
    fn default() -> Self {
        Self {
            states: [0; DestinationState::COUNT],
            results: [0; ReplyResult::COUNT],
            hard_tko: false,
            soft_tko: false,
            latency_sum_us: 0.0,
            latency_samples: 0,
            retrans_sum: 0.0,
            retrans_min: f64::INFINITY,
            retrans_max: 0.0,
            retrans_samples: 0,
            pending: 0,
            inflight: 0,
        }
    }
}

impl DestinationDigest {
    /// Fold one shard's snapshot into the digest.
    pub fn merge(&mut self, health: &DestinationHealth) {
        self.states[health.state.index()] += 1;
        for (total, count) in self.results.iter_mut().zip(health.results.iter()) {
            *total += count;
        }
        self.hard_tko |= health.hard_tko;
        self.soft_tko |= health.soft_tko;

        if let Some(latency) = health.avg_latency_us {
            self.latency_sum_us += latency;
            self.latency_samples += 1;
        }
        if let Some(ratio) = health.retrans_per_kbyte {
            self.retrans_sum += ratio;
            self.retrans_min = self.retrans_min.min(ratio);
            self.retrans_max = self.retrans_max.max(ratio);
            self.retrans_samples += 1;
        }

        self.pending += health.pending as u64;
        self.inflight += health.inflight as u64;
    }

    /// Mean of the per-shard average latencies, or 0 without samples.
    pub fn avg_latency_us(&self) -> f64 {
        if self.latency_samples == 0 {
            0.0
        } else {
            self.latency_sum_us / self.latency_samples as f64
        }
    }

    /// Average, maximum and minimum retransmission ratio, if any shard
    /// reported one.
    pub fn retrans_ratio(&self) -> Option<(f64, f64, f64)> {
        if self.retrans_samples == 0 {
            return None;
        }
        Some((
            self.retrans_sum / self.retrans_samples as f64,
            self.retrans_max,
            self.retrans_min,
        ))
    }

    /// Number of shards that see the destination in `state`.
    pub fn state_count(&self, state: DestinationState) -> u64 {
        self.states[state.index()]
    }

    pub fn result_count(&self, result: ReplyResult) -> u64 {
        self.results[result.index()]
    }

    pub fn is_hard_tko(&self) -> bool {
        self.hard_tko
    }

    pub fn is_soft_tko(&self) -> bool {
        self.soft_tko
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn inflight(&self) -> u64 {
        self.inflight
    }
}

impl fmt::Display for DestinationDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg_latency_us:{:.3} pending_reqs:{} inflight_reqs:{}",
            self.avg_latency_us(),
            self.pending,
            self.inflight
        )?;

        if self.hard_tko {
            f.write_str(" hard_tko; ")?;
        } else if self.soft_tko {
            f.write_str(" soft_tko; ")?;
        }

        if let Some((avg, max, min)) = self.retrans_ratio() {
            write!(
                f,
                " avg_retrans_ratio:{} max_retrans_ratio:{} min_retrans_ratio:{}",
                format_g(avg),
                format_g(max),
                format_g(min)
            )?;
        }

        for state in DestinationState::ALL {
            let count = self.states[state.index()];
            if count > 0 {
                write!(f, " {}:{}", state, count)?;
            }
        }

        let mut first = true;
        for &result in ReplyResult::ALL {
            let count = self.results[result.index()];
            if count > 0 {
                f.write_str(if first { "; " } else { " " })?;
                write!(f, "{}:{}", result.name(), count)?;
                first = false;
            }
        }

        Ok(())
    }
}

/// Merge every shard's destinations into one digest per destination key,
/// sorted by key.
///
/// Each shard's table is walked under its own read lock; no lock is held
/// across shards.
pub fn build_digest(shards: &[Arc<Shard>]) -> Vec<(String, DestinationDigest)> {
    let mut digests: BTreeMap<String, DestinationDigest> = BTreeMap::new();
    for shard in shards {
        shard
            .destinations()
            .foreach_destination_synced(|key, health| {
                digests.entry(key.to_string()).or_default().merge(health);
            });
    }
    digests.into_iter().collect()
}

/// One `(key, "status:<tko|down> num_failures:<n>")` pair per suspect.
pub fn render_suspects(registry: &dyn SuspectRegistry) -> Vec<(String, String)> {
    registry
        .suspect_servers()
        .into_iter()
        .map(|(key, status)| {
            let line = format!(
                "status:{} num_failures:{}",
                if status.is_tko { "tko" } else { "down" },
                status.num_failures
            );
            (key, line)
        })
        .collect()
}
