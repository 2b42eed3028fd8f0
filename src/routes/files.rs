//! File listing, upload registration, sharing and download resolution.

use crate::auth::middleware::{AppState, RequireUser};
use crate::error::AppError;
use crate::models::{FileInfo, ShareRequest, UploadRequest};
use crate::storage::Store;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};

/// `Content-Disposition` for a download: a quoted ASCII fallback plus the
/// exact name as RFC 5987 `filename*`.
pub fn content_disposition(filename: &str) -> Result<HeaderValue, AppError> {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len());
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    ))
    .map_err(|e| AppError::Internal(format!("Invalid Content-Disposition: {}", e)))
}

/// GET /api/files: Files the caller owns or has been granted
pub async fn list_files<S: Store>(
    RequireUser(user): RequireUser,
    State(state): State<AppState<S>>,
) -> Result<impl IntoResponse, AppError> {
    let files: Vec<FileInfo> = state
        .access
        .list_visible(&user.username)
        .await?
        .into_iter()
        .map(|record| FileInfo::for_viewer(record, &user.username))
        .collect();

    Ok(Json(files))
}

/// POST /api/files: Register an upload owned by the caller
pub async fn upload_file<S: Store>(
    RequireUser(user): RequireUser,
    State(state): State<AppState<S>>,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .access
        .register_upload(&user.username, &req.filename)
        .await?;

    Ok(Json(FileInfo::for_viewer(record, &user.username)))
}

/// POST /api/share: Grant another user read access to one of the caller's files
pub async fn share_file<S: Store>(
    RequireUser(user): RequireUser,
    State(state): State<AppState<S>>,
    Json(req): Json<ShareRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .access
        .share(&user.username, &req.filename, &req.username)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/files/{filename}: Resolve a visible file for download
pub async fn download_file<S: Store>(
    RequireUser(user): RequireUser,
    State(state): State<AppState<S>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .access
        .resolve_for_download(&user.username, &filename)
        .await?;

    let disposition = content_disposition(&record.filename)?;
    tracing::debug!(action = "file_download", username = %user.username, file_id = record.id, "Download resolved");

    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(FileInfo::for_viewer(record, &user.username)),
    ))
}
