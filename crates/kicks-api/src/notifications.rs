use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use kicks_types::api::Claims;
use kicks_types::models::Notification;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiPath, ApiQuery};
use crate::listings::default_limit;
use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// GET /notifications: newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let uid = claims.sub.to_string();
    let limit = query.limit.min(200);
    let notifications = blocking(&state, move |db| {
        db.list_notifications(&uid, query.unread_only, limit)
    })
    .await?;
    Ok(Json(notifications))
}

/// POST /notifications/{notification_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    ApiPath(notification_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let id = notification_id.to_string();
    let lookup = id.clone();
    let notification = blocking(&state, move |db| db.get_notification(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if notification.user_id != claims.sub {
        return Err(ApiError::forbidden("Not your notification"));
    }

    blocking(&state, move |db| db.mark_notification_read(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let uid = claims.sub.to_string();
    let updated = blocking(&state, move |db| db.mark_all_notifications_read(&uid)).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
