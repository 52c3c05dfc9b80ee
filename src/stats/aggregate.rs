//! Cross-shard aggregation.
//!
//! Each counter combines across shards according to its table entry:
//! aggregate counters are summed, rate counters sum their windowed event
//! counts before dividing once, peak counters take the highest per-bin sum
//! (`max`) or the highest single-shard bin (`max_max`). Derived ratios are
//! computed once from numerators and denominators summed over every shard.

use super::groups::Groups;
use super::list::StatName;
use super::value::StatValue;
use crate::process;
use crate::router::Router;
use crate::shard::{Shard, unix_secs};
use std::sync::Arc;

/// Rate of `stat` on a single shard over its populated window.
pub fn rate_value(shard: &Shard, stat: StatName) -> f64 {
    shard.bins().rate(stat)
}

/// Process-wide rate of `stat`.
///
/// Aggregate counters sum every shard's windowed count and divide by the
/// span of the populated window. Other counters report `issuer`'s own rate.
pub fn aggregate_rate_value(shards: &[Arc<Shard>], issuer: &Shard, stat: StatName) -> f64 {
    if !stat.is_aggregate() {
        return rate_value(issuer, stat);
    }
    let Some(first) = shards.first() else {
        return 0.0;
    };

    let bins = first.bins();
    let used = bins.num_bins_used();
    if used == 0 {
        return 0.0;
    }

    let total: u64 = shards.iter().map(|s| s.bins().within_window(stat)).sum();
    ratio(total as f64, bins.span_secs(used))
}

/// Highest per-bin value of `stat` summed across shards.
pub fn aggregate_max_value(shards: &[Arc<Shard>], stat: StatName) -> u64 {
    let used = populated_bins(shards);
    (0..used)
        .map(|i| shards.iter().map(|s| s.bins().bin(stat, i)).sum::<u64>())
        .max()
        .unwrap_or(0)
}

/// Highest value of `stat` in any single bin of any shard.
pub fn aggregate_max_max_value(shards: &[Arc<Shard>], stat: StatName) -> u64 {
    let used = populated_bins(shards);
    shards
        .iter()
        .flat_map(|s| (0..used).map(move |i| s.bins().bin(stat, i)))
        .max()
        .unwrap_or(0)
}

/// Every shard rotates on the same timer, so the first shard's count
/// stands for all of them.
fn populated_bins(shards: &[Arc<Shard>]) -> usize {
    shards.first().map(|s| s.bins().num_bins_used()).unwrap_or(0)
}

/// `num / den`, or 0 when the denominator is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// Snapshot every counter as seen from `issuer`, with process fields filled
/// in and cross-shard values combined.
///
/// Rate and peak counters are left as `issuer`'s flat values; the report
/// renders them from the bin store.
///
/// # Panics
///
/// Panics if a counter marked aggregate is not numeric.
pub fn prepare_stats(router: &Router, issuer: &Shard) -> Vec<StatValue> {
    let shards = router.shards();
    let mut values: Vec<StatValue> = StatName::ALL
        .iter()
        .map(|&stat| issuer.stats().value(stat))
        .collect();
    let mut set = |stat: StatName, value: StatValue| values[stat.index()] = value;

    let now = unix_secs();
    let start = router.start_time();
    set(
        StatName::CommandArgs,
        StatValue::String(router.process().command_args.clone()),
    );
    set(StatName::Pid, StatValue::Int64(i64::from(std::process::id())));
    set(
        StatName::ParentPid,
        StatValue::Int64(i64::from(std::os::unix::process::parent_id())),
    );
    set(StatName::Time, StatValue::Uint64(now));
    set(StatName::StartTime, StatValue::Uint64(start));
    set(StatName::Uptime, StatValue::Uint64(now.saturating_sub(start)));

    // the newest configuration installed on any shard
    let last_success = shards
        .iter()
        .map(|shard| shard.stats().get_uint64(StatName::ConfigLastSuccess))
        .max()
        .unwrap_or(0);
    set(
        StatName::ConfigLastSuccess,
        StatValue::Uint64(last_success),
    );
    set(
        StatName::ConfigAge,
        StatValue::Uint64(now.saturating_sub(last_success)),
    );
    set(
        StatName::ConfigLastAttempt,
        StatValue::Uint64(router.last_config_attempt()),
    );
    set(
        StatName::ConfigFailures,
        StatValue::Uint64(router.config_failures()),
    );

    let usage = process::usage();
    set(StatName::RusageUser, StatValue::Double(usage.rusage_user));
    set(StatName::RusageSystem, StatValue::Double(usage.rusage_system));
    set(StatName::PsNumMinorFaults, StatValue::Uint64(usage.minor_faults));
    set(StatName::PsNumMajorFaults, StatValue::Uint64(usage.major_faults));
    set(StatName::PsUserTimeSec, StatValue::Double(usage.user_time_sec));
    set(StatName::PsSystemTimeSec, StatValue::Double(usage.system_time_sec));
    set(StatName::PsRss, StatValue::Uint64(usage.rss));
    set(StatName::PsVsize, StatValue::Uint64(usage.vsize));

    set(
        StatName::NumSuspectServers,
        StatValue::Uint64(router.suspects().suspect_count() as u64),
    );

    let scheduler_sum = |f: fn(&Shard) -> u64| shards.iter().map(|s| f(s)).sum::<u64>();
    set(
        StatName::TasksAllocated,
        StatValue::Uint64(scheduler_sum(|s| s.scheduler().tasks_allocated())),
    );
    set(
        StatName::TasksPoolSize,
        StatValue::Uint64(scheduler_sum(|s| s.scheduler().tasks_pool_size())),
    );
    set(
        StatName::TasksStackHighWatermark,
        StatValue::Uint64(
            shards
                .iter()
                .map(|s| s.scheduler().stack_high_watermark())
                .max()
                .unwrap_or(0),
        ),
    );
    let durations: f64 = shards.iter().map(|s| s.scheduler().loop_duration_us()).sum();
    set(
        StatName::DurationUs,
        StatValue::Double(ratio(durations, shards.len() as f64)),
    );

    let windowed = |stat: StatName| -> f64 {
        shards
            .iter()
            .map(|s| s.bins().within_window(stat))
            .sum::<u64>() as f64
    };
    set(
        StatName::DestinationBatchSize,
        StatValue::Double(ratio(
            windowed(StatName::DestinationRequestsSum),
            windowed(StatName::DestinationBatchesSum),
        )),
    );
    set(
        StatName::RetransPerKbyteAvg,
        StatValue::Double(ratio(
            windowed(StatName::RetransPerKbyteSum),
            windowed(StatName::RetransNumTotal),
        )),
    );
    for (queue_size, wait_time, queued, helper, wait_sum) in [
        (
            StatName::OutstandingRouteGetAvgQueueSize,
            StatName::OutstandingRouteGetAvgWaitTimeSec,
            StatName::OutstandingRouteGetReqsQueued,
            StatName::OutstandingRouteGetReqsQueuedHelper,
            StatName::OutstandingRouteGetWaitTimeSumUs,
        ),
        (
            StatName::OutstandingRouteUpdateAvgQueueSize,
            StatName::OutstandingRouteUpdateAvgWaitTimeSec,
            StatName::OutstandingRouteUpdateReqsQueued,
            StatName::OutstandingRouteUpdateReqsQueuedHelper,
            StatName::OutstandingRouteUpdateWaitTimeSumUs,
        ),
    ] {
        let queued = windowed(queued);
        set(
            queue_size,
            StatValue::Double(ratio(windowed(helper), queued)),
        );
        set(
            wait_time,
            StatValue::Double(ratio(windowed(wait_sum), queued * 1_000_000.0)),
        );
    }

    for &stat in StatName::ALL {
        if !stat.is_aggregate() || stat.groups().intersects(Groups::RATE) {
            continue;
        }
        let mut total = StatValue::from(stat.def().initial);
        for shard in shards {
            total.accumulate(stat, &shard.stats().value(stat));
        }
        values[stat.index()] = total;
    }

    values
}
