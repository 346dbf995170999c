//! dropzone service: the REST command surface over a yt-dlp backed downloader.
//!
//! Configuration comes from the environment (and `.env`); `LOG_LEVEL` sets
//! the log filter, default `info`.

use std::sync::Arc;

use dropzone_dl::{Config, MediaDownloader, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    let downloader = Arc::new(MediaDownloader::from_config(config).await?);

    let api = downloader.spawn_api_server();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dropzone started");

    run_with_shutdown((*downloader).clone()).await?;
    api.abort();

    Ok(())
}
