// Termination signals -> run cancellation
use std::io;
use tokio::task::JoinHandle;
use tracing::info;

use hass_run_core::application::CancelHandle;

/// Cancel the run when the process receives SIGTERM or SIGINT
///
/// Handlers are registered before this returns, so a signal delivered right after the call is
/// never lost.
#[cfg(unix)]
pub fn forward_termination(handle: CancelHandle) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
        handle.cancel();
    }))
}

#[cfg(not(unix))]
pub fn forward_termination(handle: CancelHandle) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            handle.cancel();
        }
    }))
}
