use tokio::sync::mpsc;

/// A request to reload every loaded script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSignal;

/// Spawn a SIGUSR2 listener and return the channel it reports on
#[cfg(unix)]
pub fn setup_reload_signal() -> mpsc::Receiver<ReloadSignal> {
    let (reload_tx, reload_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigusr2 = match signal(SignalKind::user_defined2()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(target: "scripting", "Failed to register SIGUSR2 handler: {}", e);
                return;
            }
        };

        while sigusr2.recv().await.is_some() {
            tracing::info!(target: "scripting", "Received SIGUSR2 - triggering script reload");

            // A reload already pending covers this one too
            if let Err(mpsc::error::TrySendError::Closed(_)) = reload_tx.try_send(ReloadSignal) {
                tracing::info!(
                    target: "scripting",
                    "Reload signal receiver dropped, shutting down SIGUSR2 handler"
                );
                break;
            }
        }
    });

    reload_rx
}

/// Reloading on a signal needs SIGUSR2, which this platform lacks
#[cfg(not(unix))]
pub fn setup_reload_signal() -> mpsc::Receiver<ReloadSignal> {
    let (reload_tx, reload_rx) = mpsc::channel(1);
    tracing::warn!(target: "scripting", "SIGUSR2 reload not supported on this platform");
    // Keep the sender alive so the receiver never reports closed
    std::mem::forget(reload_tx);
    reload_rx
}
