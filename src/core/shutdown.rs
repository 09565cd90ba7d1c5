//! # Termination signal handling for the server.
//!
//! [`shutdown_signal`] resolves when the process is asked to stop (Ctrl-C,
//! `SIGTERM`, `SIGQUIT` on Unix) or when the given token is cancelled, whichever
//! comes first. It is meant to be handed to `axum::serve(..).with_graceful_shutdown`.
//!
//! Cancelling the token after a signal lets WebSocket forwarders and other
//! background tasks observe the same stop request.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Waits for an OS termination signal or for `token` to be cancelled, then cancels
/// `token` so every holder of a child token stops as well.
pub async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        res = os_signal() => match res {
            Ok(()) => info!("termination signal received"),
            Err(e) => {
                warn!(error = %e, "signal listener failed; waiting for explicit shutdown");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => info!("shutdown requested"),
    }
    token.cancel();
}

#[cfg(unix)]
async fn os_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
        _ = quit.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn os_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_on_cancel() {
        let token = CancellationToken::new();
        let child = token.child_token();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), shutdown_signal(token))
            .await
            .unwrap();
        assert!(child.is_cancelled());
    }
}
