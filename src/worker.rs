//! Router threads: the main context reaper and the stats ticker.

use crate::config::Config;
use crate::executor::MainContext;
use crate::router::{ProcessInfo, Router};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run the router with the given configuration until `shutdown` is set.
pub fn run(config: &Config, shutdown: Arc<AtomicBool>) -> Result<(), Box<dyn std::error::Error>> {
    let process = ProcessInfo {
        command_args: std::env::args().collect::<Vec<_>>().join(" "),
    };
    let router = Router::builder(config.router_options())
        .process(process)
        .main_context(MainContext::new())
        .build();

    serve(Arc::new(router), config, shutdown)
}

/// Drive an already built router until `shutdown` is set.
pub fn serve(
    router: Arc<Router>,
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = router.options();
    info!(
        shards = options.num_shards,
        bin_duration_secs = options.bin_duration.as_secs(),
        num_bins = options.num_bins,
        flush_enabled = options.enable_flush_cmd,
        "Starting router"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(2);

    handles.push(
        router
            .main_context()
            .spawn(config.main_context.stack_size, stop.clone())?,
    );

    {
        let router = router.clone();
        let stop = stop.clone();
        let report_interval = Duration::from_secs(config.stats.report_interval_secs);
        let handle = std::thread::Builder::new()
            .name("stats-ticker".to_string())
            .spawn(move || run_ticker(router, report_interval, stop))?;
        handles.push(handle);
    }

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Shutdown signal received, draining...");
    router.shutdown();

    let drain_timeout = Duration::from_secs(config.shutdown.drain_timeout_secs);
    drain(&router, drain_timeout);
    stop.store(true, Ordering::SeqCst);
    join_all(handles, drain_timeout);

    info!("Router shutdown complete");
    Ok(())
}

/// Rotate bins every bin duration and log the default report every
/// `report_interval` (never, if zero).
fn run_ticker(router: Arc<Router>, report_interval: Duration, stop: Arc<AtomicBool>) {
    let ticker = crossbeam_channel::tick(router.options().bin_duration);
    let mut last_report = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        if ticker.recv_timeout(Duration::from_millis(100)).is_err() {
            continue;
        }
        router.rotate_bins();

        if !report_interval.is_zero() && last_report.elapsed() >= report_interval {
            log_report(&router);
            last_report = Instant::now();
        }
    }
    debug!("Stats ticker stopped");
}

fn log_report(router: &Router) {
    let report = router.stats_reply(0, "");
    let get = |name: &str| report.get(name).unwrap_or("0");
    info!(
        uptime = get("uptime"),
        request_sent = get("request_sent"),
        request_replied = get("request_replied"),
        request_error = get("request_error"),
        num_servers = get("num_servers"),
        num_suspect_servers = get("num_suspect_servers"),
        ps_rss = get("ps_rss"),
        "Router stats"
    );
}

/// Wait for in-flight requests to be replied to and destroyed while the
/// main context is still running.
fn drain(router: &Router, drain_timeout: Duration) {
    let drain_start = Instant::now();
    loop {
        let in_flight = router.requests_in_flight();
        if in_flight == 0 {
            debug!("All requests drained");
            return;
        }
        if drain_start.elapsed() >= drain_timeout {
            warn!(in_flight, "Drain timeout reached with requests in flight");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn join_all(handles: Vec<JoinHandle<()>>, drain_timeout: Duration) {
    let drain_start = Instant::now();

    for handle in handles {
        while !handle.is_finished() {
            if drain_start.elapsed() >= drain_timeout {
                warn!("Drain timeout reached");
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        Dispatcher, Priority, ReplyResult, Request, RequestContext, RequestHandle,
    };
    use crate::router::RouterOptions;
    use parking_lot::Mutex;

    #[test]
    fn test_serve_until_shutdown() {
        let router = Arc::new(
            Router::builder(RouterOptions {
                num_shards: 2,
                ..Default::default()
            })
            .build(),
        );
        let shutdown = Arc::new(AtomicBool::new(false));

        let setter = {
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(250));
                shutdown.store(true, Ordering::SeqCst);
            })
        };

        serve(router.clone(), &Config::default(), shutdown).unwrap();
        setter.join().unwrap();
        assert!(router.shards().iter().all(|s| s.is_shutting_down()));
    }

    /// Holds every request until told to reply.
    #[derive(Default)]
    struct Hold {
        held: Mutex<Vec<RequestHandle>>,
    }

    impl Dispatcher for Hold {
        fn dispatch(&self, request: RequestHandle) {
            self.held.lock().push(request);
        }
    }

    fn send(router: &Router) {
        let shard = router.shards()[0].clone();
        RequestContext::new(shard, Request::get("k"), Priority::Critical, |_| {})
            .start_processing();
    }

    #[test]
    fn test_requests_completed_after_shutdown_are_destroyed() {
        let hold = Arc::new(Hold::default());
        let router = Arc::new(
            Router::builder(RouterOptions::default())
                .dispatcher(hold.clone())
                .build(),
        );
        send(&router);
        send(&router);
        assert_eq!(router.requests_in_flight(), 2);

        let shutdown = Arc::new(AtomicBool::new(false));
        let completer = {
            let shutdown = shutdown.clone();
            let hold = hold.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                shutdown.store(true, Ordering::SeqCst);
                // the routing layer finishes its work after shutdown starts
                std::thread::sleep(Duration::from_millis(200));
                for handle in hold.held.lock().drain(..) {
                    handle.send_reply(ReplyResult::Hit);
                }
            })
        };

        serve(router.clone(), &Config::default(), shutdown).unwrap();
        completer.join().unwrap();
        assert_eq!(router.requests_in_flight(), 0);
        assert!(router.main_context().is_closed());

        // refused by the shutting down shard and torn down inline
        send(&router);
        assert_eq!(router.main_context().pending(), 0);
        assert_eq!(router.requests_in_flight(), 0);
    }

    #[test]
    fn test_join_all_times_out() {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let start = Instant::now();
        join_all(vec![handle], Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_secs(5));
        stop.store(true, Ordering::SeqCst);
    }
}
