use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ServiceState;

/// Re-read the registry file on every SIGHUP until shutdown.
///
/// A file that fails to load leaves the running registry untouched.
pub fn spawn_registry_reloader(
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                received = sighup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    match state.reload_registry() {
                        Ok(identities) => tracing::info!(identities, "registry reloaded"),
                        Err(e) => tracing::error!(
                            "registry reload failed, keeping the previous registry: {}",
                            e
                        ),
                    }
                }
            }
        }
    }))
}
