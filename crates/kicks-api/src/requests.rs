use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use kicks_types::api::{Claims, CreateSearchRequest, CreateSearchResponse};
use kicks_types::models::{MatchKey, SearchRequest, normalize_model};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::matching;
use crate::state::{AppState, blocking};

/// POST /requests: post a "looking for", then notify owners of matching listings.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateSearchRequest>,
) -> ApiResult<impl IntoResponse> {
    let key = MatchKey::new(req.foot, &req.brand, &req.size);
    if !key.is_complete() {
        return Err(ApiError::bad_request("Please fill at least brand and size"));
    }

    let request = SearchRequest {
        id: Uuid::new_v4(),
        owner_id: claims.sub,
        foot: key.foot,
        brand: key.brand,
        model: normalize_model(req.model.as_deref()).map(|m| m.to_lowercase()),
        size: key.size,
        created_at: chrono::Utc::now(),
    };

    let to_insert = request.clone();
    blocking(&state, move |db| db.insert_request(&to_insert)).await?;
    info!("{} posted request {}", claims.sub, request.id);

    // The request stays committed even if matching fails.
    let to_match = request.clone();
    let notifications = blocking(&state, move |db| matching::notify_for_request(db, &to_match))
        .await
        .inspect_err(|e| error!("Match scan failed for request {}: {}", request.id, e))?;
    let notified = notifications.len();
    matching::deliver(&state.dispatcher, notifications).await;

    Ok((
        StatusCode::CREATED,
        Json(CreateSearchResponse { request, notified }),
    ))
}

/// GET /users/me/requests
pub async fn my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<SearchRequest>>> {
    let owner = claims.sub.to_string();
    let requests = blocking(&state, move |db| db.list_requests_by_owner(&owner)).await?;
    Ok(Json(requests))
}

/// DELETE /requests/{request_id}: owner only.
pub async fn delete_request(
    State(state): State<AppState>,
    ApiPath(request_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let id = request_id.to_string();
    let lookup = id.clone();
    let request = blocking(&state, move |db| db.get_request(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("Request not found"))?;

    if request.owner_id != claims.sub {
        return Err(ApiError::forbidden("You can only delete your own requests"));
    }

    blocking(&state, move |db| db.delete_request(&id)).await?;
    info!("{} deleted request {}", claims.sub, request_id);
    Ok(StatusCode::NO_CONTENT)
}
