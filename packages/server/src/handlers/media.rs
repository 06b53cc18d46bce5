use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppQuery;
use crate::state::AppState;

#[derive(Deserialize, utoipa::IntoParams)]
pub struct MediaQuery {
    /// Token from a playback URL.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/{path}",
    tag = "Media",
    operation_id = "streamMedia",
    summary = "Stream a stored video",
    description = "Target of playback URLs issued by the filesystem backend. Authorised by the signed `token` query parameter instead of a bearer token; the token is bound to one object path and expires.",
    params(
        ("path" = String, Path, description = "Object path"),
        MediaQuery,
    ),
    responses(
        (status = 200, description = "Video bytes", content_type = "video/*"),
        (status = 401, description = "Missing, expired or mismatched token (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn stream_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
    AppQuery(query): AppQuery<MediaQuery>,
) -> Result<Response, AppError> {
    let token = query.token.ok_or(AppError::TokenMissing)?;
    state.media_signer.verify(&token, &path).map_err(|e| {
        tracing::debug!(error = %e, "Rejected media token");
        AppError::TokenInvalid
    })?;

    let reader = state.videos.open(&path).await?;
    let content_type = mime_guess::from_path(&path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "private, max-age=300")
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
