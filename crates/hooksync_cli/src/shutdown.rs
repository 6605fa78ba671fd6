use console::Term;
use tokio::sync::watch;

/// Resolves on the next SIGINT or SIGTERM.
async fn signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.expect("Failed to install Ctrl+C handler"),
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
}

/// Set up the signal handler for graceful shutdown.
///
/// The returned receiver flips to `true` on the first SIGINT or SIGTERM. A
/// second signal exits the process with status 130.
pub(crate) fn setup_shutdown_handler() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        signal().await;

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current operations...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current operations");
        }

        let _ = tx.send(true);

        // Wait for a second signal to force quit
        signal().await;

        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });

    rx
}
