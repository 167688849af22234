//! Shutdown state for serve mode.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown signal sender for the actor system
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Install the Ctrl+C handler. Call once at program start.
///
/// Before [`register_shutdown`] the process exits right away; afterwards the
/// actors are notified and stop on their own.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        match SHUTDOWN_TX.get() {
            Some(tx) => {
                crate::log!("serve"; "shutting down...");
                let _ = tx.send(());
            }
            // nothing to wind down (one-shot commands)
            None => std::process::exit(0),
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Route Ctrl+C to the actor system instead of exiting.
pub fn register_shutdown(shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Relaxed: at worst one more envelope is handled before stopping.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
