use utoipa::OpenApi;
use crate::common::response::Outcome;
use crate::modules::media::dto::*;
use crate::modules::media::model::{AssetStatus, RenditionState};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::media::handler::upload_video,
        crate::modules::media::handler::get_media,
        crate::modules::media::handler::get_ad_video,
        crate::modules::media::handler::delete_ad_video,
        crate::modules::media::stream_handler::stream_media,
        crate::modules::media::stream_handler::stream_key,
    ),
    components(
        schemas(
            MediaAssetResponse, RenditionView, DeleteMediaResponse,
            AssetStatus, RenditionState, Outcome,
        )
    ),
    tags(
        (name = "Media", description = "Ad video upload, transcoding and streaming")
    )
)]
pub struct ApiDoc;
