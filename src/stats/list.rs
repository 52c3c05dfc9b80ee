//! The static counter table.
//!
//! Every shard carries one cell per entry, initialized from this table at
//! shard startup. Columns are: variant, reported name, type and initial
//! value, whether the report sums it across shards, whether it is recorded
//! into the bin store even though it is not rendered as a rate or peak, and
//! the report groups it belongs to.

use super::groups::Groups;

/// Build identifier reported by the `version` counter and `stats version`.
pub const PACKAGE_STRING: &str = concat!("crucible-router ", env!("CARGO_PKG_VERSION"));

/// Type and initial value of a counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initial {
    String(&'static str),
    Uint64(u64),
    Int64(i64),
    Double(f64),
}

/// One row of the counter table.
#[derive(Debug)]
pub struct StatDef {
    pub name: &'static str,
    pub initial: Initial,
    pub aggregate: bool,
    pub windowed: bool,
    pub groups: Groups,
}

impl StatDef {
    /// Whether the bin store keeps a history for this counter.
    pub fn is_binned(&self) -> bool {
        self.windowed || self.groups.intersects(Groups::WINDOWED_KINDS)
    }
}

macro_rules! stat_list {
    ($(
        $variant:ident => $name:literal, $kind:ident($init:expr), $agg:literal, $win:literal,
            [$($group:ident),*];
    )+) => {
        /// Every counter a shard carries, in report order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatName {
            $($variant,)+
        }

        impl StatName {
            /// All counters, in table order.
            pub const ALL: &'static [StatName] = &[$(StatName::$variant,)+];
        }

        pub(crate) static STATS: &[StatDef] = &[$(
            StatDef {
                name: $name,
                initial: Initial::$kind($init),
                aggregate: $agg,
                windowed: $win,
                groups: Groups::NONE$(.union(Groups::$group))*,
            },
        )+];
    };
}

stat_list! {
    // process metadata
    Version => "version", String(PACKAGE_STRING), false, false, [MCPROXY, DETAILED];
    CommandArgs => "commandargs", String(""), false, false, [MCPROXY, DETAILED];
    Pid => "pid", Int64(0), false, false, [MCPROXY, DETAILED, ODS];
    ParentPid => "parent_pid", Int64(0), false, false, [MCPROXY, DETAILED];
    Time => "time", Uint64(0), false, false, [MCPROXY, DETAILED];
    Uptime => "uptime", Uint64(0), false, false, [MCPROXY, DETAILED, ODS];
    StartTime => "start_time", Uint64(0), false, false, [DETAILED];

    // configuration
    ConfigAge => "config_age", Uint64(0), false, false, [MCPROXY, DETAILED, ODS];
    ConfigLastAttempt => "config_last_attempt", Uint64(0), false, false, [MCPROXY, DETAILED];
    ConfigLastSuccess => "config_last_success", Uint64(0), false, false, [MCPROXY, DETAILED];
    ConfigFailures => "config_failures", Uint64(0), false, false, [MCPROXY, DETAILED, ODS];

    // resource usage
    RusageSystem => "rusage_system", Double(0.0), false, false, [MCPROXY, DETAILED, ODS];
    RusageUser => "rusage_user", Double(0.0), false, false, [MCPROXY, DETAILED, ODS];
    PsNumMinorFaults => "ps_num_minor_faults", Uint64(0), false, false, [DETAILED];
    PsNumMajorFaults => "ps_num_major_faults", Uint64(0), false, false, [DETAILED];
    PsUserTimeSec => "ps_user_time_sec", Double(0.0), false, false, [DETAILED];
    PsSystemTimeSec => "ps_system_time_sec", Double(0.0), false, false, [DETAILED];
    PsRss => "ps_rss", Uint64(0), false, false, [MCPROXY, DETAILED, ODS];
    PsVsize => "ps_vsize", Uint64(0), false, false, [DETAILED];

    // scheduler
    TasksAllocated => "tasks_allocated", Uint64(0), false, false, [DETAILED];
    TasksPoolSize => "tasks_pool_size", Uint64(0), false, false, [DETAILED];
    TasksStackHighWatermark => "tasks_stack_high_watermark", Uint64(0), false, false, [DETAILED];
    DurationUs => "duration_us", Double(0.0), false, false, [MCPROXY, DETAILED, ODS];

    // destinations and clients
    NumServers => "num_servers", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumServersNew => "num_servers_new", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumServersUp => "num_servers_up", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumServersDown => "num_servers_down", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumServersClosed => "num_servers_closed", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumClients => "num_clients", Uint64(0), true, false, [MCPROXY, DETAILED, ODS];
    NumSuspectServers => "num_suspect_servers", Uint64(0), false, false, [MCPROXY, DETAILED, ODS];
    ProxyReqsProcessing => "proxy_reqs_processing", Uint64(0), true, false, [MCPROXY, DETAILED];

    // batching
    DestinationBatchSize => "destination_batch_size", Double(0.0), false, false, [DETAILED, ODS];
    DestinationBatchesSum => "destination_batches_sum", Uint64(0), false, true, [];
    DestinationRequestsSum => "destination_requests_sum", Uint64(0), false, true, [];

    // retransmissions
    RetransPerKbyteAvg => "retrans_per_kbyte_avg", Double(0.0), false, false, [DETAILED, ODS];
    RetransPerKbyteSum => "retrans_per_kbyte_sum", Uint64(0), false, true, [];
    RetransNumTotal => "retrans_num_total", Uint64(0), false, true, [];

    // outstanding route queues
    OutstandingRouteGetAvgQueueSize => "outstanding_route_get_avg_queue_size", Double(0.0), false, false, [OUTLIER, ODS];
    OutstandingRouteGetAvgWaitTimeSec => "outstanding_route_get_avg_wait_time_sec", Double(0.0), false, false, [OUTLIER, ODS];
    OutstandingRouteGetReqsQueued => "outstanding_route_get_reqs_queued", Uint64(0), false, true, [];
    OutstandingRouteGetReqsQueuedHelper => "outstanding_route_get_reqs_queued_helper", Uint64(0), false, true, [];
    OutstandingRouteGetWaitTimeSumUs => "outstanding_route_get_wait_time_sum_us", Uint64(0), false, true, [];
    OutstandingRouteUpdateAvgQueueSize => "outstanding_route_update_avg_queue_size", Double(0.0), false, false, [OUTLIER, ODS];
    OutstandingRouteUpdateAvgWaitTimeSec => "outstanding_route_update_avg_wait_time_sec", Double(0.0), false, false, [OUTLIER, ODS];
    OutstandingRouteUpdateReqsQueued => "outstanding_route_update_reqs_queued", Uint64(0), false, true, [];
    OutstandingRouteUpdateReqsQueuedHelper => "outstanding_route_update_reqs_queued_helper", Uint64(0), false, true, [];
    OutstandingRouteUpdateWaitTimeSumUs => "outstanding_route_update_wait_time_sum_us", Uint64(0), false, true, [];

    // peaks
    DestinationMaxPendingReqs => "destination_max_pending_reqs", Uint64(0), true, false, [OUTLIER, MAX];
    DestinationMaxInflightReqs => "destination_max_inflight_reqs", Uint64(0), true, false, [OUTLIER, MAX_MAX];

    // request outcomes
    RequestSent => "request_sent", Uint64(0), true, false, [MCPROXY, DETAILED, RATE];
    RequestSentCount => "request_sent_count", Uint64(0), true, false, [COUNT];
    RequestReplied => "request_replied", Uint64(0), true, false, [MCPROXY, DETAILED, RATE];
    RequestRepliedCount => "request_replied_count", Uint64(0), true, false, [COUNT];
    RequestSuccess => "request_success", Uint64(0), true, false, [MCPROXY, DETAILED, RATE];
    RequestSuccessCount => "request_success_count", Uint64(0), true, false, [COUNT];
    RequestError => "request_error", Uint64(0), true, false, [MCPROXY, DETAILED, RATE];
    RequestErrorCount => "request_error_count", Uint64(0), true, false, [COUNT];

    // commands received
    CmdGet => "cmd_get", Uint64(0), true, false, [CMD_IN, RATE];
    CmdGetCount => "cmd_get_count", Uint64(0), true, false, [CMD_IN, COUNT];
    CmdSet => "cmd_set", Uint64(0), true, false, [CMD_IN, RATE];
    CmdSetCount => "cmd_set_count", Uint64(0), true, false, [CMD_IN, COUNT];
    CmdDelete => "cmd_delete", Uint64(0), true, false, [CMD_IN, RATE];
    CmdDeleteCount => "cmd_delete_count", Uint64(0), true, false, [CMD_IN, COUNT];
    CmdArithmetic => "cmd_arithmetic", Uint64(0), true, false, [CMD_IN, RATE];
    CmdArithmeticCount => "cmd_arithmetic_count", Uint64(0), true, false, [CMD_IN, COUNT];
    CmdOther => "cmd_other", Uint64(0), true, false, [CMD_IN, RATE];
    CmdOtherCount => "cmd_other_count", Uint64(0), true, false, [CMD_IN, COUNT];

    // commands sent to destinations
    CmdOut => "cmd_out", Uint64(0), true, false, [CMD_OUT, RATE];
    CmdOutCount => "cmd_out_count", Uint64(0), true, false, [CMD_OUT, COUNT];

    // destination result classes
    ResultError => "result_error", Uint64(0), true, false, [CMD_ERROR, RATE];
    ResultErrorCount => "result_error_count", Uint64(0), true, false, [CMD_ERROR, COUNT];
    ResultConnectError => "result_connect_error", Uint64(0), true, false, [CMD_ERROR, RATE];
    ResultConnectErrorCount => "result_connect_error_count", Uint64(0), true, false, [CMD_ERROR, COUNT];
    ResultTimeout => "result_timeout", Uint64(0), true, false, [CMD_ERROR, RATE];
    ResultTimeoutCount => "result_timeout_count", Uint64(0), true, false, [CMD_ERROR, COUNT];
    ResultTko => "result_tko", Uint64(0), true, false, [CMD_ERROR, RATE];
    ResultTkoCount => "result_tko_count", Uint64(0), true, false, [CMD_ERROR, COUNT];
    ResultLocalError => "result_local_error", Uint64(0), true, false, [CMD_ERROR, RATE];
    ResultLocalErrorCount => "result_local_error_count", Uint64(0), true, false, [CMD_ERROR, COUNT];
}

impl StatName {
    /// Number of counters in the table.
    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn def(self) -> &'static StatDef {
        &STATS[self.index()]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.def().name
    }

    #[inline]
    pub fn groups(self) -> Groups {
        self.def().groups
    }

    #[inline]
    pub fn is_aggregate(self) -> bool {
        self.def().aggregate
    }

    #[inline]
    pub fn is_binned(self) -> bool {
        self.def().is_binned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_enum() {
        assert_eq!(STATS.len(), StatName::COUNT);
        for (i, stat) in StatName::ALL.iter().enumerate() {
            assert_eq!(stat.index(), i);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = StatName::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StatName::COUNT);
    }

    #[test]
    fn test_binned_counters_are_uint64() {
        for stat in StatName::ALL {
            if stat.is_binned() {
                assert!(
                    matches!(stat.def().initial, Initial::Uint64(_)),
                    "{} is binned but not uint64",
                    stat.name()
                );
            }
        }
    }

    #[test]
    fn test_aggregated_counters_are_numeric() {
        for stat in StatName::ALL {
            if stat.is_aggregate() {
                assert!(!matches!(stat.def().initial, Initial::String(_)));
            }
        }
    }

    #[test]
    fn test_peak_counters() {
        assert!(StatName::DestinationMaxPendingReqs.groups().intersects(Groups::MAX));
        assert!(StatName::DestinationMaxInflightReqs.groups().intersects(Groups::MAX_MAX));
        assert!(StatName::DestinationBatchesSum.is_binned());
        assert!(!StatName::NumServers.is_binned());
    }
}
