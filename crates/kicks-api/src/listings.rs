use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use kicks_db::{Cursor, ListingFilter};
use kicks_types::api::{Claims, CreateListingRequest, CreateListingResponse};
use kicks_types::events::GatewayEvent;
use kicks_types::models::{
    FootSide, Listing, MatchKey, format_timestamp, normalize_brand, normalize_model,
    normalize_size, parse_timestamp,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::images::ensure_owned_images;
use crate::matching;
use crate::state::{AppState, blocking};

pub const MAX_IMAGES_PER_LISTING: usize = 6;
const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub foot: Option<String>,
    pub brand: Option<String>,
    pub size: Option<String>,
    /// Cursor-based pagination: pass the `created_at` and `id` of the oldest
    /// listing from the previous page.
    pub before: Option<String>,
    pub before_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub(crate) fn default_limit() -> u32 {
    50
}

/// Parse a `before` / `before_id` pair into a page cursor. The id is only
/// meaningful next to a timestamp.
pub(crate) fn parse_cursor(
    before: Option<&str>,
    before_id: Option<Uuid>,
) -> ApiResult<Option<Cursor>> {
    let Some(raw) = before else {
        if before_id.is_some() {
            return Err(ApiError::bad_request("'before_id' needs a 'before' timestamp"));
        }
        return Ok(None);
    };
    let created_at = parse_timestamp(raw)
        .map(format_timestamp)
        .ok_or_else(|| ApiError::bad_request("Invalid 'before' timestamp"))?;
    let mut cursor = Cursor::at(created_at);
    cursor.id = before_id.map(|id| id.to_string());
    Ok(Some(cursor))
}

/// POST /listings: post a sneaker, then notify owners of matching requests.
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateListingRequest>,
) -> ApiResult<impl IntoResponse> {
    let key = MatchKey::new(req.foot, &req.brand, &req.size);
    let condition = req.condition.trim().to_string();
    if !key.is_complete() || condition.is_empty() || req.image_ids.is_empty() {
        return Err(ApiError::bad_request(
            "Please fill all fields and add an image",
        ));
    }
    if req.image_ids.len() > MAX_IMAGES_PER_LISTING {
        return Err(ApiError::bad_request(format!(
            "A listing can have at most {} images",
            MAX_IMAGES_PER_LISTING
        )));
    }
    let mut unique = req.image_ids.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != req.image_ids.len() {
        return Err(ApiError::bad_request("The same image was added twice"));
    }
    ensure_owned_images(&state, claims.sub, &req.image_ids).await?;

    let owner_id = claims.sub.to_string();
    let owner = blocking(&state, move |db| db.get_user_by_id(&owner_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    let listing = Listing {
        id: Uuid::new_v4(),
        owner_id: claims.sub,
        owner_display_name: owner.display_name,
        foot: key.foot,
        brand: key.brand,
        model: normalize_model(req.model.as_deref()),
        size: key.size,
        condition,
        image_ids: req.image_ids,
        created_at: chrono::Utc::now(),
    };

    let to_insert = listing.clone();
    blocking(&state, move |db| db.insert_listing(&to_insert)).await?;
    info!("{} posted listing {}", claims.sub, listing.id);

    state.dispatcher.publish_feed(GatewayEvent::ListingCreate {
        listing: listing.clone(),
    });

    // The listing stays committed even if matching fails.
    let to_match = listing.clone();
    let notifications = blocking(&state, move |db| matching::notify_for_listing(db, &to_match))
        .await
        .inspect_err(|e| error!("Match scan failed for listing {}: {}", listing.id, e))?;
    let notified = notifications.len();
    matching::deliver(&state.dispatcher, notifications).await;

    Ok((
        StatusCode::CREATED,
        Json(CreateListingResponse { listing, notified }),
    ))
}

/// GET /listings: home feed, newest first.
pub async fn list_listings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> ApiResult<Json<Vec<Listing>>> {
    let foot = query
        .foot
        .as_deref()
        .map(str::parse::<FootSide>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let filter = ListingFilter {
        foot,
        brand: query
            .brand
            .as_deref()
            .map(normalize_brand)
            .filter(|b| !b.is_empty()),
        size: query
            .size
            .as_deref()
            .map(normalize_size)
            .filter(|s| !s.is_empty()),
        owner_id: None,
        before: parse_cursor(query.before.as_deref(), query.before_id)?,
        limit: query.limit.min(MAX_PAGE),
    };

    let listings = blocking(&state, move |db| db.list_listings(&filter)).await?;
    Ok(Json(listings))
}

/// GET /listings/{listing_id}: product page.
pub async fn get_listing(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<Uuid>,
) -> ApiResult<Json<Listing>> {
    let listing = blocking(&state, move |db| db.get_listing(&listing_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))?;
    Ok(Json(listing))
}

/// GET /users/me/listings
pub async fn my_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Listing>>> {
    let filter = ListingFilter {
        owner_id: Some(claims.sub),
        limit: MAX_PAGE,
        ..Default::default()
    };
    let listings = blocking(&state, move |db| db.list_listings(&filter)).await?;
    Ok(Json(listings))
}

/// DELETE /listings/{listing_id}: owner only.
pub async fn delete_listing(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let id = listing_id.to_string();
    let lookup = id.clone();
    let listing = blocking(&state, move |db| db.get_listing(&lookup))
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))?;

    if listing.owner_id != claims.sub {
        return Err(ApiError::forbidden("You can only delete your own listings"));
    }

    blocking(&state, move |db| db.delete_listing(&id)).await?;
    info!("{} deleted listing {}", claims.sub, listing_id);

    state
        .dispatcher
        .publish_feed(GatewayEvent::ListingDelete { listing_id });

    Ok(StatusCode::NO_CONTENT)
}
