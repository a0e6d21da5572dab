use axum::{
    Extension, Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use kicks_db::models::ImageRow;
use kicks_types::api::{Claims, UploadImageResponse};
use kicks_types::models::format_timestamp;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiPath;
use crate::state::{AppState, blocking};

const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/heic"];

/// POST /images: raw image bytes with an image Content-Type.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Unsupported image type '{}'",
            content_type
        )));
    }

    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(state.max_image_bytes)
        } else {
            ApiError::bad_request(rejection.body_text())
        }
    })?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Image is empty"));
    }
    if bytes.len() > state.max_image_bytes {
        return Err(ApiError::PayloadTooLarge(state.max_image_bytes));
    }

    let image_id = Uuid::new_v4();
    let id = image_id.to_string();
    let sha256 = state.images.write(&id, &bytes).await?;

    let row = ImageRow {
        id: id.clone(),
        owner_id: claims.sub.to_string(),
        content_type,
        size: bytes.len() as i64,
        sha256: sha256.clone(),
        created_at: format_timestamp(chrono::Utc::now()),
    };
    if let Err(e) = blocking(&state, move |db| db.insert_image(&row)).await {
        error!("Failed to record image {}, removing file", id);
        state.images.delete(&id).await.ok();
        return Err(e);
    }

    info!("{} uploaded image {} ({} bytes)", claims.sub, image_id, bytes.len());
    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse {
            image_id,
            size: bytes.len() as u64,
            sha256,
        }),
    ))
}

/// GET /images/{image_id}: public, so listing photos render without a token.
pub async fn get_image(
    State(state): State<AppState>,
    ApiPath(image_id): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    // Validate image_id is a valid UUID to prevent path traversal
    let image_id: Uuid = image_id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid image id"))?;
    let id = image_id.to_string();

    let lookup = id.clone();
    let row = blocking(&state, move |db| db.get_image(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("Image not found"))?;

    let bytes = state.images.read(&id).await.map_err(|e| {
        error!("Image {} is recorded but unreadable: {}", id, e);
        ApiError::not_found("Image not found")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, row.content_type),
            (header::ETAG, format!("\"{}\"", row.sha256)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        bytes,
    ))
}

/// Every id must name an image uploaded by `owner`.
pub(crate) async fn ensure_owned_images(
    state: &AppState,
    owner: Uuid,
    image_ids: &[Uuid],
) -> ApiResult<()> {
    let ids: Vec<String> = image_ids.iter().map(Uuid::to_string).collect();
    let rows = blocking(state, move |db| {
        ids.iter()
            .map(|id| db.get_image(id))
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    for (id, row) in image_ids.iter().zip(rows) {
        let row = row.ok_or_else(|| ApiError::bad_request(format!("Unknown image {}", id)))?;
        if row.owner_uuid()? != owner {
            return Err(ApiError::forbidden(format!("Image {} belongs to someone else", id)));
        }
    }
    Ok(())
}
