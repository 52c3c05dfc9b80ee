//! Crucible Router binary.

use clap::Parser;
use router::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crucible-router")]
#[command(about = "Stats and request lifecycle core of a memcache routing proxy")]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            eprintln!("No config file specified. Pass a path or use --print-config");
            std::process::exit(1);
        }
    };

    router::logging::init(&config.logging);

    let shutdown = match router::signal::install_signal_handler() {
        Ok(flag) => flag,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handler");
            std::process::exit(1);
        }
    };

    if let Err(e) = router::run(&config, shutdown) {
        tracing::error!(error = %e, "Router error");
        std::process::exit(1);
    }
}

fn print_default_config() {
    let config = r#"# Crucible Router Configuration

[router]
# Number of shards (default: number of CPUs)
# shards = 8

# Forward flush_all to the routing layer instead of rejecting it
enable_flush_cmd = false

[stats]
# Length of one rate bin in seconds
bin_duration_secs = 1

# Length of the rate window in seconds (multiple of bin_duration_secs)
window_secs = 60

# How often to log the default stats report, in seconds (0 = never)
report_interval_secs = 60

[main_context]
# Stack size of the thread that tears down finished requests, in bytes
stack_size = 262144

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "info"

# Log format: "pretty", "json", or "compact"
format = "pretty"

[shutdown]
# Drain timeout in seconds
drain_timeout_secs = 30
"#;
    print!("{}", config);
}
