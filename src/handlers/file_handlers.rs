//! Serving uploaded files. Images are public; verification documents are
//! only readable by admins.

use crate::{
    errors::AppError,
    handlers::extract::{AdminUser, AppPath},
    services::upload_service::UploadKind,
    state::AppState,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// `GET /images/{file}`
pub async fn get_image(
    State(state): State<AppState>,
    AppPath(file): AppPath<String>,
) -> Result<Response, AppError> {
    stream_file(&state, UploadKind::Image, &file).await
}

/// `GET /documents/{file}`
pub async fn get_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(file): AppPath<String>,
) -> Result<Response, AppError> {
    stream_file(&state, UploadKind::Document, &file).await
}

async fn stream_file(state: &AppState, kind: UploadKind, file: &str) -> Result<Response, AppError> {
    let (handle, len) = state.uploads.open(kind, file).await?;
    let body = Body::from_stream(ReaderStream::new(handle));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(file)),
    );
    Ok(response)
}

fn content_type_for(file: &str) -> &'static str {
    let ext = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
