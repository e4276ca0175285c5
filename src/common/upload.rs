use axum::{
    body::Bytes,
    extract::{
        Multipart,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};
use bytes::BytesMut;
use futures_util::StreamExt;
use tracing::{error, info};

use crate::modules::media::error::{MediaError, ValidationError};
use crate::modules::media::intake::UploadIntake;

/// Name of the multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// A video received from a client, fully buffered and not yet validated
/// beyond the checks done while reading it.
#[derive(Debug)]
pub struct UploadedVideo {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Finds the `video` field and buffers it. The content type is checked before
/// any bytes are read and the size ceiling is enforced while reading, so an
/// oversize body is rejected without being held in memory in full.
pub async fn read_video_field(multipart: &mut Multipart, intake: &UploadIntake) -> Result<UploadedVideo, MediaError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        intake.check_content_type(content_type.as_deref())?;
        let file_name = field.file_name().map(str::to_string);

        let bytes = buffer_field(field, intake).await?;
        info!(
            size_bytes = bytes.len(),
            content_type = content_type.as_deref().unwrap_or_default(),
            "Video received"
        );

        return Ok(UploadedVideo {
            bytes,
            content_type,
            file_name,
        });
    }

    Err(MediaError::MissingVideoField)
}

async fn buffer_field(mut field: Field<'_>, intake: &UploadIntake) -> Result<Bytes, MediaError> {
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            error!("Stream error: {}", e);
            multipart_error(e)
        })?;

        let size = (buffer.len() + chunk.len()) as u64;
        if size > intake.max_video_size() {
            return Err(ValidationError::TooLarge {
                size,
                limit: intake.max_video_size(),
            }
            .into());
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

// The request body limit surfaces as a multipart read error.
fn multipart_error(e: MultipartError) -> MediaError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        MediaError::BodyTooLarge
    } else {
        MediaError::Multipart(e.body_text())
    }
}
