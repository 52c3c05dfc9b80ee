//! Counters, their bin history, and the stats report built from them.
//!
//! Every shard owns a [`ShardStats`] initialized from the static counter
//! table and a [`BinStore`] holding the rate window. A report reads the
//! issuing shard's snapshot and combines it with the other shards according
//! to each counter's table entry.

mod aggregate;
mod bins;
mod counter;
mod digest;
mod groups;
mod list;
mod report;
mod value;

pub use aggregate::{
    aggregate_max_max_value, aggregate_max_value, aggregate_rate_value, prepare_stats,
    rate_value,
};
pub use bins::BinStore;
pub use counter::ShardStats;
pub use digest::{DestinationDigest, build_digest, render_suspects};
pub use groups::Groups;
pub use list::{Initial, PACKAGE_STRING, StatDef, StatName};
pub use report::{StatsError, StatsReply, VERSION_STAT, parse_group, stats_reply};
pub use value::{StatValue, format_g};
