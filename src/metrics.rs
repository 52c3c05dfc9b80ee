//! Router metrics.

use metriken::{Counter, Gauge, metric};

/// Stats reports built.
#[metric(name = "router_stats_reports")]
pub static STATS_REPORTS: Counter = Counter::new();

/// Stats requests naming an unknown group.
#[metric(name = "router_stats_bad_group")]
pub static STATS_BAD_GROUP: Counter = Counter::new();

/// Bin rotations performed across all shards.
#[metric(name = "router_bin_rotations")]
pub static BIN_ROTATIONS: Counter = Counter::new();

/// Tasks run on the main context.
#[metric(name = "router_main_context_tasks")]
pub static MAIN_CONTEXT_TASKS: Counter = Counter::new();

/// Request contexts currently alive.
#[metric(name = "router_request_contexts")]
pub static REQUEST_CONTEXTS: Gauge = Gauge::new();

/// Requests rejected by precheck policy.
#[metric(name = "router_requests_rejected")]
pub static REQUESTS_REJECTED: Counter = Counter::new();

/// Requests refused because their shard was shutting down.
#[metric(name = "router_requests_during_shutdown")]
pub static REQUESTS_DURING_SHUTDOWN: Counter = Counter::new();
