//! Stats reports built across shards.

use router::destination::{DestinationState, SuspectSet};
use router::request::ReplyResult;
use router::stats::{PACKAGE_STRING, StatName, VERSION_STAT, build_digest};
use router::{Router, RouterOptions};
use std::sync::Arc;

fn router(num_shards: usize) -> Router {
    Router::builder(RouterOptions {
        num_shards,
        num_bins: 10,
        ..Default::default()
    })
    .build()
}

#[test]
fn servers_digest_merges_shards() {
    let router = router(2);
    for (shard, hits) in router.shards().iter().zip([3, 5]) {
        let dst = shard.destinations().emplace("D");
        dst.set_state(DestinationState::Up);
        for _ in 0..hits {
            dst.record_result(ReplyResult::Hit);
        }
    }

    let reply = router.stats_reply(0, "servers");
    assert_eq!(reply.result(), ReplyResult::Ok);
    let line = reply.get("D").unwrap();
    assert!(line.contains("hit:8"), "{line}");
    assert!(line.contains(" up:2"), "{line}");
    assert!(line.starts_with("avg_latency_us:0.000 pending_reqs:0 inflight_reqs:0"));
}

#[test]
fn servers_digest_sorted_by_key() {
    let router = router(2);
    router.shards()[0].destinations().emplace("b:11211");
    router.shards()[1].destinations().emplace("a:11211");
    router.shards()[1].destinations().emplace("c:11211");

    let reply = router.stats_reply(1, "servers");
    let keys: Vec<&str> = reply.stats().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a:11211", "b:11211", "c:11211"]);
}

#[test]
fn unknown_group_is_client_error() {
    let router = router(1);
    let reply = router.stats_reply(0, "bogus");
    assert_eq!(reply.result(), ReplyResult::ClientError);
    assert_eq!(reply.message(), "bad stats command");
    assert!(reply.stats().is_empty());
}

#[test]
fn version_short_circuits() {
    let router = router(1);
    let reply = router.stats_reply(0, "version");
    assert_eq!(reply.stats().len(), 1);
    assert_eq!(reply.get(VERSION_STAT), Some(PACKAGE_STRING));
}

#[test]
fn default_group_contents() {
    let router = router(1);
    let reply = router.stats_reply(0, "");
    assert_eq!(reply.result(), ReplyResult::Ok);
    assert!(reply.get("version").is_some());
    assert!(reply.get("uptime").is_some());
    assert!(reply.get("request_replied").is_some());
    assert_eq!(reply.get("cmd_get"), None);
    assert_eq!(reply.get("request_replied_count"), None);
}

#[test]
fn config_last_success_is_newest_across_shards() {
    let router = router(2);
    router.shards()[0].stats().set_uint64(StatName::ConfigLastSuccess, 10);
    router.shards()[1].stats().set_uint64(StatName::ConfigLastSuccess, 20);

    for issuer in 0..2 {
        assert_eq!(
            router.stats_reply(issuer, "detailed").get("config_last_success"),
            Some("20")
        );
    }
}

#[test]
fn aggregate_counters_are_summed() {
    let router = router(3);
    for shard in router.shards() {
        shard.stats().incr(StatName::RequestRepliedCount, 4);
        shard.destinations().emplace("x:11211");
    }

    let reply = router.stats_reply(2, "all");
    assert_eq!(reply.get("request_replied_count"), Some("12"));
    assert_eq!(reply.get("num_servers"), Some("3"));
    assert_eq!(reply.get("num_servers_new"), Some("3"));
}

#[test]
fn rates_sum_then_divide() {
    let router = router(2);
    let shards = router.shards();

    assert_eq!(router.stats_reply(0, "cmd-in").get("cmd_get"), Some("0"));

    shards[0].stats().incr(StatName::CmdGet, 7);
    shards[1].stats().incr(StatName::CmdGet, 1);
    router.rotate_bins();
    router.rotate_bins();
    router.rotate_bins();
    router.rotate_bins();

    // 8 events over four one-second bins
    assert_eq!(router.stats_reply(1, "cmd").get("cmd_get"), Some("2"));
}

#[test]
fn peaks_render_from_bins() {
    let router = router(2);
    let shards = router.shards();
    let a = shards[0].destinations().emplace("a");
    let b = shards[1].destinations().emplace("b");

    a.set_pending(4);
    b.set_pending(5);
    a.set_inflight(7);
    b.set_inflight(2);
    router.rotate_bins();
    a.set_pending(1);
    router.rotate_bins();

    let reply = router.stats_reply(0, "outlier");
    assert_eq!(reply.get("destination_max_pending_reqs"), Some("9"));
    assert_eq!(reply.get("destination_max_inflight_reqs"), Some("7"));
}

#[test]
fn derived_ratio_defaults_to_zero() {
    let router = router(2);
    router.rotate_bins();
    let reply = router.stats_reply(0, "detailed");
    assert_eq!(reply.get("destination_batch_size"), Some("0"));
    assert_eq!(reply.get("retrans_per_kbyte_avg"), Some("0"));
}

#[test]
fn suspect_servers() {
    let suspects = Arc::new(SuspectSet::new());
    suspects.mark("10.0.0.2:11211", false, 3);
    suspects.mark("10.0.0.1:11211", true, 12);
    let router = Router::builder(RouterOptions::default())
        .suspects(suspects.clone())
        .build();

    let reply = router.stats_reply(0, "suspect_servers");
    assert_eq!(
        reply.get("10.0.0.1:11211"),
        Some("status:tko num_failures:12")
    );
    assert_eq!(
        reply.get("10.0.0.2:11211"),
        Some("status:down num_failures:3")
    );
    assert_eq!(router.stats_reply(0, "").get("num_suspect_servers"), Some("2"));
}

#[test]
fn config_counters() {
    let router = router(1);
    router.apply_config("pools: {}");
    router.record_config_failure();

    let reply = router.stats_reply(0, "");
    assert_eq!(reply.get("config_failures"), Some("1"));
    assert!(reply.get("config_last_attempt").unwrap().parse::<u64>().unwrap() > 0);
    let age: u64 = reply.get("config_age").unwrap().parse().unwrap();
    assert!(age < 5);
}

#[test]
fn servers_digest_reports_tko() {
    let router = router(2);
    let soft = router.shards()[0].destinations().emplace("soft");
    soft.set_tko(false, true);
    let a = router.shards()[0].destinations().emplace("both");
    let b = router.shards()[1].destinations().emplace("both");
    a.set_tko(false, true);
    b.set_tko(true, false);

    let reply = router.stats_reply(0, "servers");
    assert!(reply.get("soft").unwrap().contains(" soft_tko; "));
    let line = reply.get("both").unwrap();
    assert!(line.contains(" hard_tko; "), "{line}");
    assert!(!line.contains("soft_tko"), "{line}");

    let digest = build_digest(router.shards());
    let (_, both) = digest.iter().find(|(key, _)| key == "both").unwrap();
    assert!(both.is_hard_tko());
    assert!(both.is_soft_tko());

    b.set_tko(false, false);
    a.set_tko(false, false);
    let line = router.stats_reply(1, "servers").get("both").unwrap().to_string();
    assert!(!line.contains("tko"), "{line}");
}
