use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod events;
pub mod handler;
pub mod intake;
pub mod model;
pub mod range;
pub mod repository;
pub mod service;
pub mod stream_handler;

// Room for multipart framing around the video itself.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

pub fn router(state: &AppState) -> Router<AppState> {
    let body_limit = usize::try_from(state.intake.max_video_size().saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    let upload_routes = Router::new()
        .route(
            "/ads/{ad_id}/video",
            get(handler::get_ad_video)
                .post(handler::upload_video)
                .delete(handler::delete_ad_video),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    Router::new()
        .route("/media/{id}", get(handler::get_media))
        .route("/media/{id}/stream", get(stream_handler::stream_media))
        .route("/videos/{*key}", get(stream_handler::stream_key))
        .merge(upload_routes)
}
