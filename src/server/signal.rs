use crate::server::ShutdownHandle;
use tokio::task::JoinHandle;

/// Spawn the OS signal listener: on interrupt (and terminate, on unix) it
/// requests shutdown through the handle. The task is aborted when the stop
/// phase runs.
pub(crate) fn spawn_signal_listener(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        handle.begin_shutdown();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("failed to install terminate handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
