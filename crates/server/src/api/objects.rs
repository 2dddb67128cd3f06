use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vanish_blob::BlobBody;
use vanish_core::{Binding, ObjectId};
use vanish_lifecycle::{Clock, NewObject};

use super::AppState;
use crate::error::ServerError;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_NAME: &str = "file";

/// Query parameters accepted by `POST /v1/objects`.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Requested lifetime. Clamped to the configured TTL bounds.
    pub ttl_seconds: Option<u64>,
    /// Original file name, echoed back on download.
    pub name: Option<String>,
}

/// Binding as returned by the metadata endpoint.
#[derive(Debug, Serialize)]
pub struct BindingResponse {
    #[serde(flatten)]
    pub binding: Binding,
    /// Whole seconds until the binding expires.
    pub remaining_seconds: u64,
}

fn parse_id(raw: &str) -> Result<ObjectId, ServerError> {
    // A malformed id can never name an object.
    ObjectId::parse(raw).map_err(|_| ServerError::NotFound)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// `Content-Disposition` value with the name reduced to printable ASCII.
fn attachment_disposition(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// `POST /v1/objects` -- store the raw request body as a new object.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ServerError> {
    let size = content_length(&headers).ok_or(ServerError::LengthRequired)?;
    if size > state.max_upload_bytes {
        return Err(ServerError::PayloadTooLarge {
            size,
            limit: state.max_upload_bytes,
        });
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_owned();
    let original_name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_NAME.to_owned());

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let binding = state
        .manager
        .create(NewObject {
            body: BlobBody::from_stream(stream),
            size,
            content_type,
            original_name,
            ttl: params.ttl_seconds.map(Duration::from_secs),
        })
        .await?;

    let location = HeaderValue::from_str(&format!("/v1/objects/{}", binding.id))
        .map_err(|e| ServerError::Config(e.to_string()))?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(binding),
    )
        .into_response())
}

/// `GET /v1/objects/{id}` -- stream the payload.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let id = parse_id(&id)?;
    let fetched = state.manager.fetch(&id).await?;
    let binding = fetched.binding;
    debug!(object_id = %binding.id, size = binding.size, "streaming object");

    let content_type = HeaderValue::from_str(&binding.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, HeaderValue::from(binding.size)),
        (
            header::CONTENT_DISPOSITION,
            attachment_disposition(&binding.original_name),
        ),
    ];
    Ok((
        StatusCode::OK,
        headers,
        Body::from_stream(fetched.body.into_stream()),
    )
        .into_response())
}

/// `GET /v1/objects/{id}/meta` -- the binding, without touching the payload.
pub async fn meta(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BindingResponse>, ServerError> {
    let id = parse_id(&id)?;
    let binding = state.manager.stat(&id).await?;
    let remaining_seconds = binding.remaining_ttl(state.manager.clock().now()).as_secs();
    Ok(Json(BindingResponse {
        binding,
        remaining_seconds,
    }))
}

/// `DELETE /v1/objects/{id}` -- reclaim the object now.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let id = parse_id(&id)?;
    state.manager.expire_now(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
