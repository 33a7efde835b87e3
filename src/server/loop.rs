// Server loop module
// Accepts connections until shutdown, then waits for in-flight ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::ShutdownListener;
use crate::config::AppState;
use crate::logger;

/// Interval between checks while draining connections
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept loop for the monitor's HTTP listener.
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
/// Each connection gets its own copy of `shutdown`. Returns once shutdown
/// is requested; the listener is closed on return.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    mut shutdown: ShutdownListener,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            shutdown.clone(),
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }
            () = shutdown.wait() => {
                logger::log_info("[SHUTDOWN] No longer accepting connections");
                break;
            }
        }
    }
}

/// Wait for open connections to finish, up to `grace`.
///
/// Returns the number of connections still open when giving up.
pub async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let open = active_connections.load(Ordering::SeqCst);
        if open == 0 {
            return 0;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "{open} connection(s) still open after {}s grace period",
                grace.as_secs()
            ));
            return open;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
