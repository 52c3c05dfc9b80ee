//! Stats report assembly.

use super::aggregate::{
    aggregate_max_max_value, aggregate_max_value, aggregate_rate_value, prepare_stats,
};
use super::digest::{build_digest, render_suspects};
use super::groups::Groups;
use super::list::{PACKAGE_STRING, StatName};
use super::value::format_g;
use crate::metrics::{STATS_BAD_GROUP, STATS_REPORTS};
use crate::request::{Reply, ReplyResult};
use crate::router::Router;
use crate::shard::Shard;
use bytes::Bytes;
use std::fmt::Write;
use tracing::debug;

/// Name of the single pair returned for `stats version`.
pub const VERSION_STAT: &str = "crucible-router-version";

/// Errors from a stats request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("bad stats command")]
    UnknownGroup(String),
}

/// Map a stats group argument to the groups it selects.
pub fn parse_group(name: &str) -> Result<Groups, StatsError> {
    let groups = match name {
        "" => Groups::MCPROXY,
        "all" => Groups::ALL,
        "detailed" => Groups::DETAILED,
        "cmd" => Groups::CMD_ALL,
        "cmd-in" => Groups::CMD_IN,
        "cmd-out" => Groups::CMD_OUT,
        "cmd-error" => Groups::CMD_ERROR,
        "ods" => Groups::ODS,
        "servers" => Groups::SERVERS,
        "suspect_servers" => Groups::SUSPECT_SERVERS,
        "count" => Groups::COUNT,
        "outlier" => Groups::OUTLIER,
        _ => return Err(StatsError::UnknownGroup(name.to_string())),
    };
    Ok(groups)
}

/// A rendered stats report.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReply {
    result: ReplyResult,
    message: String,
    stats: Vec<(String, String)>,
}

impl StatsReply {
    fn ok(stats: Vec<(String, String)>) -> Self {
        Self {
            result: ReplyResult::Ok,
            message: String::new(),
            stats,
        }
    }

    fn error(result: ReplyResult, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
            stats: Vec::new(),
        }
    }

    pub fn result(&self) -> ReplyResult {
        self.result
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `(name, value)` pairs in report order.
    pub fn stats(&self) -> &[(String, String)] {
        &self.stats
    }

    /// Value of the first pair named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.stats
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert into a protocol reply, one `STAT <name> <value>` line per
    /// pair.
    pub fn into_reply(self) -> Reply {
        if self.result.is_error() {
            return Reply::with_message(self.result, self.message);
        }
        let mut body = String::new();
        for (name, value) in &self.stats {
            let _ = write!(body, "STAT {} {}\r\n", name, value);
        }
        Reply::new(self.result).with_value(Bytes::from(body))
    }
}

/// Build the report for `group` as seen from `issuer`.
///
/// The issuer's stats lock is held while counters are snapshotted, so the
/// snapshot cannot straddle a bin rotation. It is released before the
/// destination walk, which locks each shard's table on its own.
pub fn stats_reply(router: &Router, issuer: &Shard, group: &str) -> StatsReply {
    STATS_REPORTS.increment();

    let mut stats = Vec::new();
    let groups = {
        let _guard = issuer.lock_stats();

        if group == "version" {
            return StatsReply::ok(vec![(
                VERSION_STAT.to_string(),
                PACKAGE_STRING.to_string(),
            )]);
        }

        let groups = match parse_group(group) {
            Ok(groups) => groups,
            Err(e) => {
                STATS_BAD_GROUP.increment();
                debug!(group, "Unknown stats group");
                return StatsReply::error(ReplyResult::ClientError, e.to_string());
            }
        };

        if groups.intersects(Groups::ALL) {
            render_counters(router, issuer, groups, &mut stats);
        }
        groups
    };

    if groups.intersects(Groups::SERVERS) {
        for (key, digest) in build_digest(router.shards()) {
            stats.push((key, digest.to_string()));
        }
    }
    if groups.intersects(Groups::SUSPECT_SERVERS) {
        stats.extend(render_suspects(router.suspects()));
    }

    StatsReply::ok(stats)
}

fn render_counters(
    router: &Router,
    issuer: &Shard,
    groups: Groups,
    out: &mut Vec<(String, String)>,
) {
    let values = prepare_stats(router, issuer);
    let shards = router.shards();

    for &stat in StatName::ALL {
        let stat_groups = stat.groups();
        if !stat_groups.intersects(groups) {
            continue;
        }
        let value = if stat_groups.intersects(Groups::RATE) {
            format_g(aggregate_rate_value(shards, issuer, stat))
        } else if stat_groups.intersects(Groups::MAX) {
            aggregate_max_value(shards, stat).to_string()
        } else if stat_groups.intersects(Groups::MAX_MAX) {
            aggregate_max_max_value(shards, stat).to_string()
        } else {
            values[stat.index()].to_string()
        };
        out.push((stat.name().to_string(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group() {
        assert_eq!(parse_group(""), Ok(Groups::MCPROXY));
        assert_eq!(parse_group("cmd"), Ok(Groups::CMD_ALL));
        assert_eq!(parse_group("suspect_servers"), Ok(Groups::SUSPECT_SERVERS));
        assert_eq!(
            parse_group("bogus"),
            Err(StatsError::UnknownGroup("bogus".to_string()))
        );
        assert_eq!(
            parse_group("bogus").unwrap_err().to_string(),
            "bad stats command"
        );
    }

    #[test]
    fn test_into_reply() {
        let reply = StatsReply::ok(vec![("pid".to_string(), "42".to_string())]).into_reply();
        assert_eq!(reply.result(), ReplyResult::Ok);
        assert_eq!(reply.value().as_ref(), b"STAT pid 42\r\n");

        let reply = StatsReply::error(ReplyResult::ClientError, "bad stats command").into_reply();
        assert_eq!(reply.result(), ReplyResult::ClientError);
        assert_eq!(reply.message(), "bad stats command");
    }

    #[test]
    fn test_get() {
        let reply = StatsReply::ok(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);
        assert_eq!(reply.get("b"), Some("2"));
        assert_eq!(reply.get("c"), None);
    }
}
