use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Waits for the host to be asked to quit and cancels `cancellation`. Ctrl-C everywhere, and
/// SIGTERM on unix so that a plain `kill` still ends the session with a commit.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
        },
        _ = terminate => {
            info!("Termination requested");
        },
        _ = cancellation.cancelled() => {
            return;
        },
    };
    cancellation.cancel();
}
