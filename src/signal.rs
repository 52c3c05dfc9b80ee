//! Shutdown signal handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Install a SIGINT/SIGTERM handler.
///
/// Returns the flag the handler sets. A second signal exits immediately.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            warn!("Received second signal, forcing immediate exit");
            std::process::exit(1);
        }
        info!("Received shutdown signal, draining router");
    })?;

    Ok(shutdown)
}
