//! Proctoring worker binary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use proctor_worker::{
    load_camera_config, replay_feed, FileEvidenceSink, JsonRosterProvider, LogNotifier,
    SessionExecutor, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("proctor=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting proctor-worker");

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        proctor_worker::metrics::init_metrics(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    let engine = config.load_engine_config()?;
    let cameras = load_camera_config(&config.camera_config_path)?;

    let mut feeds = HashMap::new();
    for camera_id in cameras.keys() {
        let dir = config.replay_dir.join(camera_id.to_string());
        match replay_feed(&dir) {
            Ok(feed) => {
                feeds.insert(*camera_id, feed);
            }
            Err(e) => warn!(camera_id = %camera_id, "Camera unavailable: {}", e),
        }
    }

    let executor = SessionExecutor::new(
        config.clone(),
        engine,
        cameras,
        Arc::new(JsonRosterProvider::new(&config.roster_path)),
        Arc::new(FileEvidenceSink::new(&config.evidence_dir)),
        Arc::new(LogNotifier),
    );

    // Setup signal handler
    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.trigger();
    });

    match executor.run(config.session_mode, feeds).await {
        Ok(report) => {
            for (camera_id, stats) in &report.cameras {
                info!(camera_id = %camera_id, "Camera summary: {:?}", stats);
            }
            if report.dispatched.is_none() {
                warn!("Dispatch queue did not drain before the shutdown timeout");
            }
        }
        Err(e) if e.is_session_fatal() => {
            warn!("Session ended: {}", e);
        }
        Err(e) => {
            error!("Session error: {}", e);
            return Err(e.into());
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
