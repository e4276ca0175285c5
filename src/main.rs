use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{info, warn};
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

#[cfg(test)]
mod test_support;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, run_migrations};
use crate::infrastructure::queue::jobs::TranscodeQueue;
use crate::infrastructure::storage::build_media_store;
use crate::modules::ad::repository::PgAdRepository;
use crate::modules::media::intake::UploadIntake;
use crate::modules::media::repository::PgMediaRepository;
use crate::state::AppState;
use crate::workers::ffmpeg::FfmpegTranscoder;
use crate::workers::transcoder::start_transcoder_workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;

    let pool = connect_to_db(&config.database_url).await?;
    run_migrations(&pool).await?;

    let storage = build_media_store(&config.storage).await?;
    let intake = UploadIntake::new(&config.scratch_dir, config.max_video_size).await?;

    let transcoder = FfmpegTranscoder::new(&config.transcode.ffmpeg_path, config.transcode.timeout);
    if !transcoder.check_available().await {
        warn!("Uploads will be accepted but only originals will be playable");
    }

    let (queue, jobs) = TranscodeQueue::unbounded();

    let state = AppState::new(
        Arc::new(PgMediaRepository::new(pool.clone())),
        Arc::new(PgAdRepository::new(pool)),
        storage,
        Arc::new(transcoder),
        intake,
        queue,
        config.transcode.clone(),
    );

    let _workers = start_transcoder_workers(state.clone(), jobs, config.transcode.workers);

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
