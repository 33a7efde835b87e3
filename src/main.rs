use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod handler;
mod http;
mod logger;
mod page;
mod sensor;
mod server;

/// Config file used when no path is given (extension optional)
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Create Tokio runtime, sized by the workers setting when present
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    let state = Arc::new(config::AppState::from_config(&cfg));
    let tracker = Arc::clone(&state.tracker);
    let active_connections = Arc::new(AtomicUsize::new(0));

    let shutdown = Arc::new(server::Shutdown::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    let sampler = match cfg.sensor.source {
        config::SourceKind::Simulated => {
            let source = sensor::SimulatedSource::from_config(&cfg.sensor);
            Some(tokio::spawn(sensor::sampler::run(
                tracker,
                Box::new(source),
                Duration::from_millis(cfg.sensor.sample_interval_ms),
                shutdown.subscribe(),
            )))
        }
        config::SourceKind::Push => {
            logger::log_info("[SENSOR] Push mode: waiting for POST /data");
            None
        }
    };

    logger::log_server_start(&addr, &cfg);

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    let open = local
        .run_until(async {
            server::start_server_loop(
                listener,
                state,
                Arc::clone(&active_connections),
                shutdown.subscribe(),
            )
            .await;
            server::drain_connections(
                &active_connections,
                Duration::from_secs(cfg.server.shutdown_grace),
            )
            .await
        })
        .await;

    if let Some(handle) = sampler {
        if let Err(e) = handle.await {
            logger::log_error(&format!("Sampler task failed: {e}"));
        }
    }

    logger::log_shutdown(open);
    Ok(())
}
