use std::io;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use flowgate_stream::{
    FileBlobReader, ReadPump, ReadPumpConfig, ReadPumpDelegate, SideDataRequest, data_pipe,
    resolve_read_window,
};
use flowgate_types::{ByteRange, Completion, NetError};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::storage::Storage;

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub pump_config: ReadPumpConfig,
    pub pipe_capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct BlobInfo {
    pub id: String,
    pub size: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/blobs/{id}",
            get(download_blob).put(upload_blob).delete(delete_blob),
        )
        .route("/blobs/{id}/info", get(blob_info))
        .route("/health", get(health))
        .with_state(state)
}

// ── Download ────────────────────────────────────────────────────────────

/// Size reported by the pump once the range has been applied, or the error
/// that ended the session before that point.
type HeadResult = Result<(u64, u64), NetError>;

/// Bridges pump callbacks to the HTTP handler: the response head is sent as
/// soon as the size is known, the final status once the pump completes.
struct ResponseDelegate {
    blob_id: String,
    head: Option<oneshot::Sender<HeadResult>>,
    done: Option<oneshot::Sender<Completion>>,
}

impl ReadPumpDelegate for ResponseDelegate {
    fn did_calculate_size(&mut self, total_size: u64, content_length: u64) -> SideDataRequest {
        if let Some(head) = self.head.take() {
            let _ = head.send(Ok((total_size, content_length)));
        }
        SideDataRequest::Skip
    }

    fn on_complete(&mut self, result: Completion, total_written: u64) {
        if let Some(head) = self.head.take() {
            let _ = head.send(Err(result.err().unwrap_or(NetError::Unexpected)));
        }
        match result {
            Ok(()) => debug!("Blob {} streamed: {} bytes", self.blob_id, total_written),
            Err(NetError::Aborted) => info!(
                "Blob {} download aborted by client after {} bytes",
                self.blob_id, total_written
            ),
            Err(e) => warn!("Blob {} stream failed after {} bytes: {}", self.blob_id, total_written, e),
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(result);
        }
    }
}

/// GET /blobs/{id}: stream a blob, honouring a single `Range: bytes=` header.
pub async fn download_blob(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let path = state.storage.blob_path(&blob_id).ok_or(StatusCode::NOT_FOUND)?;

    // Malformed or multi-range headers are ignored and the whole blob is sent.
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse_header)
        .unwrap_or_default();

    let (producer, consumer) = data_pipe(state.pipe_capacity);
    let (head_tx, head_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let delegate = ResponseDelegate {
        blob_id: blob_id.clone(),
        head: Some(head_tx),
        done: Some(done_tx),
    };
    ReadPump::new(FileBlobReader::new(path), range, producer, delegate, state.pump_config.clone())
        .spawn();

    let (total_size, content_length) = match head_rx.await {
        Ok(Ok(sizes)) => sizes,
        Ok(Err(NetError::FileNotFound)) => return Err(StatusCode::NOT_FOUND),
        Ok(Err(NetError::RangeNotSatisfiable)) => {
            return Ok(range_not_satisfiable(&state.storage, &blob_id).await);
        }
        Ok(Err(e)) => {
            warn!("Blob {} could not be opened: {}", blob_id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let content_range = if range.is_unbounded() {
        None
    } else {
        resolve_read_window(&range, total_size)
            .ok()
            .and_then(|w| w.last_byte().map(|last| format!("bytes {}-{}/{}", w.offset, last, total_size)))
    };

    // Chunks flow as the consumer drains the pipe; a failed session ends the
    // body with an error so the client sees a truncated transfer.
    let stream = async_stream::stream! {
        let chunks = consumer.into_stream();
        futures_util::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            yield Ok::<Bytes, io::Error>(chunk);
        }
        match done_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                yield Err(io::Error::from(e));
            }
            Err(_) => {
                yield Err(io::Error::from(NetError::Unexpected));
            }
        }
    };

    let status = if content_range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK };
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(value) = content_range {
        builder = builder.header(header::CONTENT_RANGE, value);
    }
    builder
        .body(Body::from_stream(stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn range_not_satisfiable(storage: &Storage, blob_id: &str) -> Response {
    let size = storage.blob_size(blob_id).await.ok().flatten().unwrap_or(0);
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{}", size))],
    )
        .into_response()
}

// ── Upload / metadata ───────────────────────────────────────────────────

/// PUT /blobs/{id}: store the request body as the blob's content.
pub async fn upload_blob(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, StatusCode> {
    if state.storage.blob_path(&blob_id).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let size = state
        .storage
        .write_blob(&blob_id, body.into_data_stream())
        .await
        .map_err(|e| {
            warn!("Upload of blob {} failed: {}", blob_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("Blob {} stored: {} bytes", blob_id, size);
    Ok((StatusCode::CREATED, Json(BlobInfo { id: blob_id, size })))
}

/// GET /blobs/{id}/info: blob size.
pub async fn blob_info(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
) -> Result<Json<BlobInfo>, StatusCode> {
    let size = state
        .storage
        .blob_size(&blob_id)
        .await
        .map_err(|e| {
            warn!("Failed to stat blob {}: {}", blob_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(BlobInfo { id: blob_id, size }))
}

/// DELETE /blobs/{id}
pub async fn delete_blob(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
) -> StatusCode {
    match state.storage.delete_blob(&blob_id).await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!("Failed to delete blob {}: {}", blob_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}
