//! Ctrl-C aware cancellation for long-running CLI operations.

use tokio_util::sync::CancellationToken;

/// Install a SIGINT/SIGTERM listener and return the token it cancels.
///
/// The listener runs as a background task; pass clones of the returned
/// token to any loop that should stop on the first signal (e.g. QR login
/// polling).
pub fn install() -> CancellationToken {
    let token = CancellationToken::new();
    let listener_token = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, cancelling...");
            }
            _ = sigterm() => {
                tracing::info!("Received SIGTERM, cancelling...");
            }
        }
        listener_token.cancel();
    });

    token
}

#[cfg(unix)]
async fn sigterm() {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler")
        .recv()
        .await;
}

#[cfg(not(unix))]
async fn sigterm() {
    // No SIGTERM off Unix; wait forever.
    std::future::pending::<()>().await;
}
