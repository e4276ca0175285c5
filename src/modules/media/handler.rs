use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::read_video_field;
use crate::modules::media::dto::*;
use crate::modules::media::service::MediaService;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/ads/{ad_id}/video",
    params(
        ("ad_id" = i64, Path, description = "Ad ID")
    ),
    request_body(content_type = "multipart/form-data", description = "Video file in the `video` field"),
    responses(
        (status = 202, description = "Original Stored, Transcoding Scheduled", body = ApiResponse<MediaAssetResponse>),
        (status = 400, description = "Bad Request"),
        (status = 404, description = "Ad Not Found"),
        (status = 413, description = "Video Too Large"),
        (status = 415, description = "Not A Video"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Path(ad_id): Path<i64>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    // Reject unknown ads before reading the body.
    if let Err(e) = MediaService::ensure_ad_exists(&state, ad_id).await {
        return e.into_response();
    }

    let upload = match read_video_field(&mut multipart, &state.intake).await {
        Ok(u) => u,
        Err(e) => return e.into_response(),
    };

    match MediaService::ingest(&state, ad_id, upload).await {
        Ok(asset) => {
            info!(asset_id = %asset.id, ad_id, "Video accepted");
            let res = MediaAssetResponse::from_asset(asset, &state.transcode.renditions);
            ApiSuccess(ApiResponse::success(res, "Video uploaded, transcoding scheduled"), StatusCode::ACCEPTED).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/media/{id}",
    params(
        ("id" = Uuid, Path, description = "Media asset ID")
    ),
    responses(
        (status = 200, description = "Get Media Asset", body = ApiResponse<MediaAssetResponse>),
        (status = 404, description = "Media Asset Not Found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match MediaService::get_asset(&state, id).await {
        Ok(asset) => {
            let res = MediaAssetResponse::from_asset(asset, &state.transcode.renditions);
            ApiSuccess(ApiResponse::success(res, "Media asset retrieved successfully"), StatusCode::OK).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/ads/{ad_id}/video",
    params(
        ("ad_id" = i64, Path, description = "Ad ID")
    ),
    responses(
        (status = 200, description = "Newest Video Of The Ad", body = ApiResponse<MediaAssetResponse>),
        (status = 404, description = "Ad Not Found Or No Video"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn get_ad_video(
    State(state): State<AppState>,
    Path(ad_id): Path<i64>,
) -> impl IntoResponse {
    match MediaService::latest_for_ad(&state, ad_id).await {
        Ok(Some(asset)) => {
            let res = MediaAssetResponse::from_asset(asset, &state.transcode.renditions);
            ApiSuccess(ApiResponse::success(res, "Media asset retrieved successfully"), StatusCode::OK).into_response()
        }
        Ok(None) => ApiError::not_found(format!("Ad {} has no video", ad_id)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/ads/{ad_id}/video",
    params(
        ("ad_id" = i64, Path, description = "Ad ID")
    ),
    responses(
        (status = 200, description = "Videos Deleted", body = ApiResponse<DeleteMediaResponse>),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn delete_ad_video(
    State(state): State<AppState>,
    Path(ad_id): Path<i64>,
) -> impl IntoResponse {
    match MediaService::delete_for_ad(&state, ad_id).await {
        Ok((deleted_assets, deleted_objects)) => {
            let res = DeleteMediaResponse {
                deleted_assets,
                deleted_objects,
            };
            ApiSuccess(ApiResponse::success(res, "Ad videos deleted"), StatusCode::OK).into_response()
        }
        Err(e) => e.into_response(),
    }
}
