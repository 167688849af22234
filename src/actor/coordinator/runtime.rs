use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio_util::sync::CancellationToken;

use crate::actor::orchestrator::CompilerOrchestrator;
use crate::actor::sync::VariableSync;
use crate::bus::bridge::Bridge;

/// Grace period for actors to finish after cancellation.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run all actors until shutdown, then cancel and drain them.
pub(super) async fn run_actors(
    orchestrator: CompilerOrchestrator,
    sync: VariableSync,
    bridge: Option<Bridge>,
    shutdown_rx: Option<Receiver<()>>,
    cancel: CancellationToken,
) -> Result<()> {
    let orchestrator_handle = tokio::spawn(orchestrator.run(cancel.clone()));
    let sync_handle = tokio::spawn(sync.run(cancel.clone()));
    let bridge_handle = bridge.map(|b| tokio::spawn(b.run(cancel.clone())));

    loop {
        let signalled = shutdown_rx.as_ref().is_some_and(|rx| rx.try_recv().is_ok());
        if signalled || crate::core::is_shutdown() {
            crate::debug!("actor"; "shutdown signal received");
            break;
        }
        if orchestrator_handle.is_finished() || sync_handle.is_finished() {
            crate::log!("error"; "actor exited unexpectedly");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    cancel.cancel();

    // a build in flight is awaited by the orchestrator itself
    let drain = async {
        let _ = orchestrator_handle.await;
        let _ = sync_handle.await;
        if let Some(handle) = bridge_handle {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        crate::log!("actor"; "actors did not stop within {:?}", DRAIN_TIMEOUT);
    }
    Ok(())
}
