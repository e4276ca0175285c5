use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dto::StreamQuery;
use super::error::DeliveryError;
use super::range::ByteRange;
use super::service::MediaService;
use crate::infrastructure::storage::{MediaReader, MediaStore, content_type_for};
use crate::state::AppState;

/// Stream a stored object by key with support for Range requests
#[utoipa::path(
    get,
    path = "/api/v1/videos/{key}",
    params(
        ("key" = String, Path, description = "Storage key, e.g. videos/{id}/720p.mp4"),
        ("Range" = Option<String>, Header, description = "Byte range, only the first range is honored")
    ),
    responses(
        (status = 200, description = "Full Content"),
        (status = 206, description = "Partial Content"),
        (status = 400, description = "Malformed Range"),
        (status = 404, description = "Not Found"),
        (status = 416, description = "Range Not Satisfiable"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn stream_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    match serve(state.storage.as_ref(), &key, headers.get(header::RANGE)).await {
        Ok(res) => res,
        Err(e) => e.into_response(),
    }
}

/// Stream an asset, picking a rendition when one is requested and ready
#[utoipa::path(
    get,
    path = "/api/v1/media/{id}/stream",
    params(
        ("id" = Uuid, Path, description = "Media asset ID"),
        StreamQuery,
        ("Range" = Option<String>, Header, description = "Byte range, only the first range is honored")
    ),
    responses(
        (status = 200, description = "Full Content"),
        (status = 206, description = "Partial Content"),
        (status = 400, description = "Malformed Range"),
        (status = 404, description = "Not Found"),
        (status = 416, description = "Range Not Satisfiable"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn stream_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let key = match MediaService::resolve_stream_key(&state, id, query.quality.as_deref()).await {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };

    match serve(state.storage.as_ref(), &key, headers.get(header::RANGE)).await {
        Ok(res) => res,
        Err(e) => e.into_response(),
    }
}

/// Builds a full (200) or partial (206) response for `key`.
///
/// A malformed Range header is rejected before storage is touched. Full
/// responses stream straight from the store. Partial ones open the object at
/// `start` and are read into a buffer of exactly the requested length, so an
/// I/O failure still turns into a 500.
pub async fn serve(store: &dyn MediaStore, key: &str, range: Option<&HeaderValue>) -> Result<Response, DeliveryError> {
    let range = match range {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| DeliveryError::BadRange("non-ASCII header".to_string()))?;
            Some(ByteRange::parse(raw)?)
        }
        None => None,
    };

    let Some(range) = range else {
        let object = store.get(key).await?;
        let length = object.length;
        debug!(key = %key, length, "Serving full object");

        let body = Body::from_stream(ReaderStream::new(object.reader));
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, pick_content_type(object.content_type, key))
            .header(header::CONTENT_LENGTH, length)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(body)
            .map_err(|e| DeliveryError::Internal(e.to_string()));
    };

    let meta = store.stat(key).await?;
    let length = meta.length;
    let (start, end) = range.resolve(length)?;
    let reader = store.get_range(key, start, end).await?;
    let chunk = read_slice(reader, end - start + 1, key).await?;
    debug!(key = %key, start, end, length, "Serving partial object");

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, pick_content_type(meta.content_type, key))
        .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, length))
        .header(header::CONTENT_LENGTH, chunk.len())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from(chunk))
        .map_err(|e| DeliveryError::Internal(e.to_string()))
}

// Generic binary types from the backend are replaced by the type guessed from the key.
fn pick_content_type(stored: Option<String>, key: &str) -> String {
    stored
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| content_type_for(key))
}

/// Reads `len` bytes. The buffer always has `len` bytes; a short read leaves
/// the tail zeroed and is logged.
async fn read_slice(mut reader: MediaReader, len: u64, key: &str) -> Result<Vec<u8>, DeliveryError> {
    let len = usize::try_from(len).map_err(|_| DeliveryError::Internal("range too large".to_string()))?;
    let mut buffer = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled < len {
        warn!(key = %key, expected = len, read = filled, "Short read while serving range");
    }
    Ok(buffer)
}
