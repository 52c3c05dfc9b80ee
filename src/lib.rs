//! Crucible Router - stats and request lifecycle core of a cache-routing
//! proxy.
//!
//! Each shard keeps lock-free counters with a rotating bin window; a stats
//! request combines them across shards and can digest the health of every
//! backend destination. Request contexts deliver exactly one reply and are
//! torn down on the main context.

pub mod config;
pub mod destination;
pub mod executor;
pub mod metrics;
pub mod process;
pub mod request;
pub mod router;
pub mod shard;
pub mod stats;
pub mod worker;

pub mod logging;
pub mod signal;

pub use config::Config;
pub use router::{Router, RouterBuilder, RouterOptions};
pub use worker::run;
