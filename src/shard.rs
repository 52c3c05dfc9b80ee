//! One processing shard: its counters, bin history, destinations and the
//! routing configuration its requests are dispatched under.

use crate::destination::DestinationMap;
use crate::executor::MainContext;
use crate::request::Dispatcher;
use crate::router::RouterOptions;
use crate::stats::{BinStore, ShardStats, StatName};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Seconds since the Unix epoch.
pub(crate) fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// An immutable routing configuration snapshot.
///
/// Requests capture the snapshot current at dispatch and keep it alive until
/// they are destroyed, so a reload never changes the configuration under an
/// in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    generation: u64,
    source: String,
}

impl RouteConfig {
    pub fn new(generation: u64, source: impl Into<String>) -> Self {
        Self {
            generation,
            source: source.into(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Counters published by the runtime that executes a shard's handlers.
#[derive(Default)]
pub struct SchedulerStats {
    tasks_allocated: AtomicU64,
    tasks_pool_size: AtomicU64,
    stack_high_watermark: AtomicU64,
    /// f64 microseconds stored as bits.
    loop_duration_us: AtomicU64,
}

impl SchedulerStats {
    pub fn record_tasks(&self, allocated: u64, pool_size: u64, stack_high_watermark: u64) {
        self.tasks_allocated.store(allocated, Ordering::Relaxed);
        self.tasks_pool_size.store(pool_size, Ordering::Relaxed);
        self.stack_high_watermark
            .fetch_max(stack_high_watermark, Ordering::Relaxed);
    }

    /// Record the average duration of one event loop iteration.
    pub fn record_loop_duration(&self, duration: Duration) {
        let us = duration.as_secs_f64() * 1_000_000.0;
        self.loop_duration_us.store(us.to_bits(), Ordering::Relaxed);
    }

    pub fn tasks_allocated(&self) -> u64 {
        self.tasks_allocated.load(Ordering::Relaxed)
    }

    pub fn tasks_pool_size(&self) -> u64 {
        self.tasks_pool_size.load(Ordering::Relaxed)
    }

    pub fn stack_high_watermark(&self) -> u64 {
        self.stack_high_watermark.load(Ordering::Relaxed)
    }

    pub fn loop_duration_us(&self) -> f64 {
        f64::from_bits(self.loop_duration_us.load(Ordering::Relaxed))
    }
}

/// A processing shard.
pub struct Shard {
    id: usize,
    options: Arc<RouterOptions>,
    stats: Arc<ShardStats>,
    bins: BinStore,
    /// Serializes report assembly against bin rotation.
    stats_lock: Mutex<()>,
    destinations: DestinationMap,
    scheduler: SchedulerStats,
    shutting_down: AtomicBool,
    config: RwLock<Arc<RouteConfig>>,
    dispatcher: Arc<dyn Dispatcher>,
    main_context: MainContext,
}

impl Shard {
    pub(crate) fn new(
        id: usize,
        options: Arc<RouterOptions>,
        config: Arc<RouteConfig>,
        dispatcher: Arc<dyn Dispatcher>,
        main_context: MainContext,
    ) -> Self {
        let stats = Arc::new(ShardStats::new());
        let bins = BinStore::new(options.num_bins, options.bin_duration);
        let destinations = DestinationMap::new(stats.clone());
        stats.set_uint64(StatName::ConfigLastSuccess, unix_secs());

        Self {
            id,
            options,
            stats,
            bins,
            stats_lock: Mutex::new(()),
            destinations,
            scheduler: SchedulerStats::default(),
            shutting_down: AtomicBool::new(false),
            config: RwLock::new(config),
            dispatcher,
            main_context,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn stats(&self) -> &Arc<ShardStats> {
        &self.stats
    }

    pub fn bins(&self) -> &BinStore {
        &self.bins
    }

    pub fn destinations(&self) -> &DestinationMap {
        &self.destinations
    }

    pub fn scheduler(&self) -> &SchedulerStats {
        &self.scheduler
    }

    pub fn main_context(&self) -> &MainContext {
        &self.main_context
    }

    pub(crate) fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub(crate) fn lock_stats(&self) -> MutexGuard<'_, ()> {
        self.stats_lock.lock()
    }

    /// The routing configuration currently in effect.
    pub fn config(&self) -> Arc<RouteConfig> {
        self.config.read().clone()
    }

    /// Install a new routing configuration, returning the previous one.
    pub fn swap_config(&self, config: Arc<RouteConfig>) -> Arc<RouteConfig> {
        let old = std::mem::replace(&mut *self.config.write(), config);
        self.stats
            .set_uint64(StatName::ConfigLastSuccess, unix_secs());
        old
    }

    /// Close the current bin and advance the window.
    pub fn rotate_bins(&self) {
        let _guard = self.lock_stats();
        self.bins.rotate(&self.stats);
        trace!(
            shard = self.id,
            bins_used = self.bins.num_bins_used(),
            "Rotated stat bins"
        );
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Reply, ReplyResult, RequestHandle};

    struct Ignore;

    impl Dispatcher for Ignore {
        fn dispatch(&self, request: RequestHandle) {
            request.send_reply(Reply::new(ReplyResult::Miss));
        }
    }

    fn shard() -> Shard {
        Shard::new(
            0,
            Arc::new(RouterOptions::default()),
            Arc::new(RouteConfig::new(0, "")),
            Arc::new(Ignore),
            MainContext::new(),
        )
    }

    #[test]
    fn test_swap_config() {
        let shard = shard();
        shard.stats().set_uint64(StatName::ConfigLastSuccess, 0);

        let old = shard.swap_config(Arc::new(RouteConfig::new(1, "{}")));
        assert_eq!(old.generation(), 0);
        assert_eq!(shard.config().generation(), 1);
        assert_eq!(shard.config().source(), "{}");
        assert!(shard.stats().get_uint64(StatName::ConfigLastSuccess) > 0);
    }

    #[test]
    fn test_rotate_bins() {
        let shard = shard();
        shard.stats().incr(StatName::RequestSent, 7);
        shard.rotate_bins();
        assert_eq!(shard.bins().num_bins_used(), 1);
        assert_eq!(shard.bins().within_window(StatName::RequestSent), 7);
        assert_eq!(shard.stats().get_uint64(StatName::RequestSent), 0);
    }

    #[test]
    fn test_shutdown_flag() {
        let shard = shard();
        assert!(!shard.is_shutting_down());
        shard.begin_shutdown();
        assert!(shard.is_shutting_down());
    }

    #[test]
    fn test_scheduler_stats() {
        let scheduler = SchedulerStats::default();
        scheduler.record_tasks(10, 4, 2048);
        scheduler.record_tasks(12, 4, 1024);
        scheduler.record_loop_duration(Duration::from_micros(250));
        assert_eq!(scheduler.tasks_allocated(), 12);
        assert_eq!(scheduler.stack_high_watermark(), 2048);
        assert!((scheduler.loop_duration_us() - 250.0).abs() < 1e-6);
    }
}
