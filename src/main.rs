use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::queue::rabbitmq::RabbitMqService;
use infrastructure::storage::s3::StorageService;
use modules::transcode::pipeline::JobPipeline;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting HLS worker...");

    let config = AppConfig::new()?;
    tokio::fs::create_dir_all(&config.video_folder).await?;

    let storage = StorageService::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_bucket,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .await;
    let queue = RabbitMqService::new(&config.rabbitmq_url).await?;

    let pipeline = JobPipeline::new(&config, Arc::new(storage));
    let state = AppState::new(config, pipeline, Arc::new(queue.clone()));

    tokio::spawn(workers::transcoder::start_transcoder_worker(state.clone(), queue));

    let port = state.config.server_port;
    let app = app::create_app(state).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
