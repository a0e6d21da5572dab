use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use kicks_db::models::UserRow;
use kicks_types::api::{Claims, MeResponse, UpdateProfileRequest};
use kicks_types::models::UserProfile;

use crate::auth::validate_display_name;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::images::ensure_owned_images;
use crate::state::{AppState, blocking};

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MeResponse>> {
    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(me_response(user)?))
}

/// PATCH /users/me: omitted fields stay as they are.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<MeResponse>> {
    let display_name = req
        .display_name
        .as_deref()
        .map(validate_display_name)
        .transpose()?;

    if let Some(photo) = req.photo_image_id {
        ensure_owned_images(&state, claims.sub, &[photo]).await?;
    }
    let photo = req.photo_image_id.map(|id| id.to_string());

    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| {
        db.update_profile(&uid, display_name.as_deref(), photo.as_deref())
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!("{} updated their profile", claims.sub);
    Ok(Json(me_response(user)?))
}

/// GET /users/{user_id}: public seller profile.
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let user = blocking(&state, move |db| db.get_user_by_id(&user_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into_profile()?))
}

fn me_response(user: UserRow) -> ApiResult<MeResponse> {
    let email = user.email.clone();
    let email_verified = user.email_verified;
    let profile = user.into_profile()?;
    Ok(MeResponse {
        id: profile.id,
        email,
        email_verified,
        display_name: profile.display_name,
        photo_image_id: profile.photo_image_id,
        created_at: profile.created_at,
    })
}
