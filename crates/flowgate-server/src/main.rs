mod routes;
mod storage;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use flowgate_stream::{DEFAULT_CHUNK_SIZE, DEFAULT_PIPE_CAPACITY, ReadPumpConfig};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes::AppState;
use crate::storage::Storage;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowgate_server=debug,flowgate_stream=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("FLOWGATE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("FLOWGATE_PORT")
        .unwrap_or_else(|_| "3311".into())
        .parse()?;
    let storage_dir: PathBuf = std::env::var("FLOWGATE_STORAGE_DIR")
        .unwrap_or_else(|_| "./blob-storage".into())
        .into();
    let chunk_size: usize = env_or("FLOWGATE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE);
    let pipe_capacity: usize = env_or("FLOWGATE_PIPE_CAPACITY", DEFAULT_PIPE_CAPACITY);

    let storage = Arc::new(Storage::new(storage_dir).await?);

    let state = AppState {
        storage,
        pump_config: ReadPumpConfig::default().with_max_chunk_size(chunk_size),
        pipe_capacity,
    };

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Flowgate blob server listening on {}", addr);
    info!("Chunk size {} bytes, pipe capacity {} bytes", chunk_size, pipe_capacity);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
