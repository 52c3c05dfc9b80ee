//! The router instance: its shards and the process-wide state the stats
//! report reads.

use crate::destination::{SuspectRegistry, SuspectSet};
use crate::executor::MainContext;
use crate::metrics::BIN_ROTATIONS;
use crate::request::{Dispatcher, Reply, ReplyResult, RequestHandle};
use crate::shard::{RouteConfig, Shard, unix_secs};
use crate::stats::{self, StatName, StatsReply};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Immutable runtime options, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOptions {
    pub num_shards: usize,
    /// Allow `flush_all` to reach the routing layer.
    pub enable_flush_cmd: bool,
    pub bin_duration: Duration,
    /// Number of bins in the rate window.
    pub num_bins: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            num_shards: 1,
            enable_flush_cmd: false,
            bin_duration: Duration::from_secs(1),
            num_bins: 60,
        }
    }
}

/// Process-scoped values injected at startup and reported verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    /// The command line the router was started with, space separated.
    pub command_args: String,
}

/// Dispatcher used until a routing layer is attached. Every request is
/// answered with a local error.
struct NoRoute;

impl Dispatcher for NoRoute {
    fn dispatch(&self, request: RequestHandle) {
        request.send_reply(Reply::with_message(
            ReplyResult::LocalError,
            "no route configured",
        ));
    }
}

/// Builder for a [`Router`].
pub struct RouterBuilder {
    options: RouterOptions,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    suspects: Option<Arc<dyn SuspectRegistry>>,
    process: ProcessInfo,
    main_context: Option<MainContext>,
    config: String,
}

impl RouterBuilder {
    pub fn new(options: RouterOptions) -> Self {
        Self {
            options,
            dispatcher: None,
            suspects: None,
            process: ProcessInfo::default(),
            main_context: None,
            config: String::new(),
        }
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn suspects(mut self, suspects: Arc<dyn SuspectRegistry>) -> Self {
        self.suspects = Some(suspects);
        self
    }

    pub fn process(mut self, process: ProcessInfo) -> Self {
        self.process = process;
        self
    }

    pub fn main_context(mut self, main_context: MainContext) -> Self {
        self.main_context = Some(main_context);
        self
    }

    /// Initial routing configuration source.
    pub fn config(mut self, source: impl Into<String>) -> Self {
        self.config = source.into();
        self
    }

    pub fn build(self) -> Router {
        let options = Arc::new(self.options);
        let dispatcher = self.dispatcher.unwrap_or_else(|| Arc::new(NoRoute));
        let suspects = self
            .suspects
            .unwrap_or_else(|| Arc::new(SuspectSet::new()));
        let main_context = self.main_context.unwrap_or_default();
        let config = Arc::new(RouteConfig::new(0, self.config));

        let shards = (0..options.num_shards.max(1))
            .map(|id| {
                Arc::new(Shard::new(
                    id,
                    options.clone(),
                    config.clone(),
                    dispatcher.clone(),
                    main_context.clone(),
                ))
            })
            .collect();

        let now = unix_secs();
        Router {
            options,
            shards,
            suspects,
            process: self.process,
            main_context,
            start_time: now,
            generation: AtomicU64::new(0),
            last_config_attempt: AtomicU64::new(now),
            config_failures: AtomicU64::new(0),
        }
    }
}

/// A running router.
pub struct Router {
    options: Arc<RouterOptions>,
    shards: Vec<Arc<Shard>>,
    suspects: Arc<dyn SuspectRegistry>,
    process: ProcessInfo,
    main_context: MainContext,
    start_time: u64,
    generation: AtomicU64,
    last_config_attempt: AtomicU64,
    config_failures: AtomicU64,
}

impl Router {
    pub fn builder(options: RouterOptions) -> RouterBuilder {
        RouterBuilder::new(options)
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    pub fn shard(&self, id: usize) -> Option<&Arc<Shard>> {
        self.shards.get(id)
    }

    pub fn suspects(&self) -> &dyn SuspectRegistry {
        self.suspects.as_ref()
    }

    pub fn process(&self) -> &ProcessInfo {
        &self.process
    }

    pub fn main_context(&self) -> &MainContext {
        &self.main_context
    }

    /// Unix time the router was built.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn last_config_attempt(&self) -> u64 {
        self.last_config_attempt.load(Ordering::Relaxed)
    }

    pub fn config_failures(&self) -> u64 {
        self.config_failures.load(Ordering::Relaxed)
    }

    /// Requests accepted on any shard whose context has not been destroyed.
    pub fn requests_in_flight(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.stats().get_uint64(StatName::ProxyReqsProcessing))
            .sum()
    }

    /// Install a new routing configuration on every shard. Returns its
    /// generation.
    pub fn apply_config(&self, source: impl Into<String>) -> u64 {
        self.last_config_attempt
            .store(unix_secs(), Ordering::Relaxed);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let config = Arc::new(RouteConfig::new(generation, source));
        for shard in &self.shards {
            shard.swap_config(config.clone());
        }
        info!(generation, "Applied routing configuration");
        generation
    }

    /// Note a configuration attempt that could not be applied.
    pub fn record_config_failure(&self) {
        self.last_config_attempt
            .store(unix_secs(), Ordering::Relaxed);
        let failures = self.config_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(failures, "Routing configuration rejected");
    }

    /// Rotate the bin window of every shard.
    pub fn rotate_bins(&self) {
        for shard in &self.shards {
            shard.rotate_bins();
        }
        BIN_ROTATIONS.increment();
    }

    /// Build the stats report for `group` as seen from `shard`.
    ///
    /// # Panics
    ///
    /// Panics if `shard` is not a shard of this router.
    pub fn stats_reply(&self, shard: usize, group: &str) -> StatsReply {
        stats::stats_reply(self, &self.shards[shard], group)
    }

    /// Stop accepting requests on every shard.
    pub fn shutdown(&self) {
        for shard in &self.shards {
            shard.begin_shutdown();
        }
        info!(shards = self.shards.len(), "Router shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(num_shards: usize) -> Router {
        Router::builder(RouterOptions {
            num_shards,
            ..Default::default()
        })
        .build()
    }

    #[test]
    fn test_build_shards() {
        let router = router(3);
        assert_eq!(router.shards().len(), 3);
        assert_eq!(router.shard(2).map(|s| s.id()), Some(2));
        assert!(router.shard(3).is_none());
    }

    #[test]
    fn test_apply_config() {
        let router = router(2);
        assert_eq!(router.apply_config("a"), 1);
        assert_eq!(router.apply_config("b"), 2);
        for shard in router.shards() {
            assert_eq!(shard.config().generation(), 2);
            assert_eq!(shard.config().source(), "b");
        }
    }

    #[test]
    fn test_config_failures() {
        let router = router(1);
        router.record_config_failure();
        router.record_config_failure();
        assert_eq!(router.config_failures(), 2);
        assert!(router.last_config_attempt() >= router.start_time());
    }

    #[test]
    fn test_rotate_bins_all_shards() {
        let router = router(2);
        router.shards()[1].stats().incr(StatName::CmdGet, 4);
        router.rotate_bins();
        for shard in router.shards() {
            assert_eq!(shard.bins().num_bins_used(), 1);
        }
        assert_eq!(router.shards()[1].bins().within_window(StatName::CmdGet), 4);
    }

    #[test]
    fn test_shutdown_marks_shards() {
        let router = router(2);
        router.shutdown();
        assert!(router.shards().iter().all(|s| s.is_shutting_down()));
    }
}
