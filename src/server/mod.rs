// Server module entry
// Listener setup, accept loop, connection handling and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

// Rust does not allow `loop` as a module name (keyword), so use server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_reusable_listener;
pub use server_loop::{drain_connections, start_server_loop};
pub use signal::{start_signal_handler, Shutdown, ShutdownListener};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, AppState};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_serves_page_data_and_calibration_over_tcp() {
        let cfg = config::from_toml(
            "[sensor]\nsource = \"push\"\n[logging]\naccess_log = false\n",
        )
        .unwrap();
        let state = Arc::new(AppState::from_config(&cfg));
        state.tracker.ingest_angles(Some(12.34), Some(-5.67)).unwrap();

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&connections),
                    shutdown.subscribe(),
                ));

                let page = roundtrip(addr, "GET / HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n").await;
                assert!(page.starts_with("HTTP/1.1 200 OK"), "{page}");
                assert!(page.contains("id=\"pitch\""));

                let data = roundtrip(addr, "GET /data HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n").await;
                assert!(data.contains(r#""pitch":"12.34""#), "{data}");
                assert!(data.contains(r#""roll":"-5.67""#), "{data}");

                let calibrated = roundtrip(addr, "GET /calibrate HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n").await;
                assert!(calibrated.starts_with("HTTP/1.1 200 OK"), "{calibrated}");

                let data = roundtrip(addr, "GET /data HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n").await;
                assert!(data.contains(r#""pitch":"0.00""#), "{data}");

                shutdown.trigger();
                tokio::time::timeout(Duration::from_secs(2), server)
                    .await
                    .expect("server loop stops on shutdown")
                    .unwrap();
                assert_eq!(drain_connections(&connections, Duration::from_secs(2)).await, 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_rejects_connections_over_limit() {
        let cfg = config::from_toml(
            "[performance]\nmax_connections = 0\n[logging]\naccess_log = false\n",
        )
        .unwrap();
        let state = Arc::new(AppState::from_config(&cfg));
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&connections),
                    shutdown.subscribe(),
                ));

                // rejected sockets are closed before anything is read or written
                let mut stream = TcpStream::connect(addr).await.unwrap();
                let mut buf = Vec::new();
                let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf))
                    .await
                    .expect("server closes the socket");
                assert!(read.map_or(true, |n| n == 0));
                assert_eq!(connections.load(std::sync::atomic::Ordering::SeqCst), 0);

                shutdown.trigger();
                server.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connection() {
        let cfg = config::from_toml("[logging]\naccess_log = false\n").unwrap();
        let state = Arc::new(AppState::from_config(&cfg));
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&connections),
                    shutdown.subscribe(),
                ));

                // one poll from the page, connection left open afterwards
                let mut stream = TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(b"GET /data HTTP/1.1\r\nHost: device\r\n\r\n")
                    .await
                    .unwrap();
                let mut buf = Vec::new();
                while !String::from_utf8_lossy(&buf).ends_with('}') {
                    let mut chunk = [0u8; 1024];
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "connection closed before the response");
                    buf.extend_from_slice(&chunk[..n]);
                }
                assert_eq!(connections.load(std::sync::atomic::Ordering::SeqCst), 1);

                shutdown.trigger();
                server.await.unwrap();

                let started = tokio::time::Instant::now();
                let left = drain_connections(&connections, Duration::from_secs(10)).await;
                assert_eq!(left, 0);
                assert!(started.elapsed() < Duration::from_secs(2));

                // the client sees the close
                let mut rest = Vec::new();
                let read = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest))
                    .await
                    .expect("server closes the idle connection");
                assert!(read.map_or(true, |n| n == 0));
            })
            .await;
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_is_413() {
        let cfg = config::from_toml(
            "[sensor]\nsource = \"push\"\n[http]\nmax_body_size = 16\n[logging]\naccess_log = false\n",
        )
        .unwrap();
        let state = Arc::new(AppState::from_config(&cfg));
        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let connections = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&connections),
                    shutdown.subscribe(),
                ));

                // no Content-Length, so only the streaming limit can catch it
                let body = format!(r#"{{"pitch": 1.0, "roll": {}}}"#, "2".repeat(24));
                let request = format!(
                    "POST /data HTTP/1.1\r\nHost: device\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n{:x}\r\n{body}\r\n0\r\n\r\n",
                    body.len()
                );
                let resp = roundtrip(addr, &request).await;
                assert!(resp.starts_with("HTTP/1.1 413"), "{resp}");
                assert!(!state.tracker.has_samples());

                let small = r#"{"roll": 3.5}"#;
                let request = format!(
                    "POST /data HTTP/1.1\r\nHost: device\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n{:x}\r\n{small}\r\n0\r\n\r\n",
                    small.len()
                );
                let resp = roundtrip(addr, &request).await;
                assert!(resp.starts_with("HTTP/1.1 200 OK"), "{resp}");
                assert_eq!(state.tracker.reading().roll, "3.50");

                shutdown.trigger();
                server.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let open = AtomicUsize::new(2);
        let left = drain_connections(&open, Duration::from_millis(60)).await;
        assert_eq!(left, 2);
    }
}
