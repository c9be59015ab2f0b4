//! Product image uploads, stored on local disk and served back under `/uploads/`.

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::super::{ApiError, ApiResponse, AppState};

const IMAGE_FIELD: &str = "image";
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Serialize)]
pub(in crate::api) struct UploadResponse {
    pub url: String,
    pub path: String,
}

/// `.ext` taken from the client's filename when it is short and alphanumeric,
/// otherwise nothing.
fn safe_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Randomized on-disk name: `<unix millis>-<uuid><.ext>`.
fn stored_file_name(original: Option<&str>) -> String {
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        safe_extension(original)
    )
}

fn bad_upload(rid: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(rid, "bad_request", message)
}

/// POST /upload — multipart form with a single `image` field.
pub(in crate::api) async fn upload_image(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadResponse>>), ApiError> {
    let rid = req_id.0;
    let settings = &state.uploads;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_upload(&rid, format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(bad_upload(&rid, "Only image uploads are allowed"));
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_upload(&rid, format!("Invalid multipart body: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Err(bad_upload(&rid, "No image uploaded"));
    };
    if bytes.is_empty() {
        return Err(bad_upload(&rid, "Uploaded image is empty"));
    }
    if bytes.len() > settings.max_bytes {
        return Err(bad_upload(
            &rid,
            format!("Image exceeds the {} byte limit", settings.max_bytes),
        ));
    }

    let stored = stored_file_name(file_name.as_deref());
    let write = async {
        tokio::fs::create_dir_all(&settings.dir).await?;
        tokio::fs::write(settings.dir.join(&stored), &bytes).await
    };
    write.await.map_err(|e| {
        tracing::error!(request_id = %rid, error = %e, dir = %settings.dir.display(), "failed to store upload");
        ApiError::new(&rid, "internal_error", "Internal server error")
    })?;

    let path = format!("/uploads/{stored}");
    tracing::info!(request_id = %rid, path = %path, bytes = bytes.len(), "image uploaded");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            rid,
            UploadResponse {
                url: format!("{}{path}", settings.public_url),
                path,
            },
        )),
    ))
}
