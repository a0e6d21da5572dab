use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::warn;

use kicks_gateway::{connection, verify_token};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::middleware::{require_auth, require_auth_for_chat};
use crate::state::AppState;
use crate::{auth, conversations, images, listings, notifications, requests, users};

/// Build the full HTTP + WebSocket surface.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/listings", get(listings::list_listings))
        .route("/listings/{listing_id}", get(listings::get_listing))
        .route("/images/{image_id}", get(images::get_image))
        .route("/users/{user_id}", get(users::get_user))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/auth/password", post(auth::change_password))
        .route("/auth/verify-email/resend", post(auth::resend_verification))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/me/listings", get(listings::my_listings))
        .route("/users/me/requests", get(requests::my_requests))
        .route("/listings", post(listings::create_listing))
        .route("/listings/{listing_id}", delete(listings::delete_listing))
        .route("/requests", post(requests::create_request))
        .route("/requests/{request_id}", delete(requests::delete_request))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_read),
        )
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/images",
            post(images::upload_image).layer(DefaultBodyLimit::max(state.max_image_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let chat_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::open_conversation),
        )
        .route(
            "/conversations/{conversation_id}",
            get(conversations::get_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(conversations::get_messages).post(conversations::send_message),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth_for_chat,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(chat_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// GET /gateway: a token in the query authenticates at upgrade time,
/// otherwise the client has to Identify over the socket.
async fn ws_upgrade(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<impl IntoResponse> {
    let user_id = match query.token.as_deref() {
        Some(token) => {
            let claims = verify_token(token, &state.jwt_secret).ok_or_else(|| {
                warn!("Rejected gateway upgrade with an invalid token");
                ApiError::Unauthorized("Please log in to continue".into())
            })?;
            Some(claims.sub)
        }
        None => None,
    };

    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, jwt_secret, user_id)
    }))
}
