//! One-to-one buyer/seller chat.
//!
//! A conversation's id is derived from its two participants, so opening the
//! same pair twice always lands in the same thread.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use kicks_types::api::{Claims, OpenConversationRequest, SendMessageRequest};
use kicks_types::events::GatewayEvent;
use kicks_types::models::{Conversation, Message, conversation_participants};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::listings::{default_limit, parse_cursor};
use crate::state::{AppState, blocking};

pub const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Pass the `created_at` and `id` of the oldest message already shown to
    /// page back.
    pub before: Option<String>,
    pub before_id: Option<Uuid>,
}

/// POST /conversations: get or create the thread with another user.
/// 201 when the thread is new, 200 when it already existed.
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<OpenConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.user_id == claims.sub {
        return Err(ApiError::bad_request("You can't message yourself"));
    }

    let other = req.user_id.to_string();
    blocking(&state, move |db| db.get_user_by_id(&other))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let me = claims.sub;
    let (conversation, created) = blocking(&state, move |db| {
        db.open_conversation(me, req.user_id, chrono::Utc::now())
    })
    .await?;

    let status = if created {
        info!("{} opened conversation {}", me, conversation.id);
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(conversation)))
}

/// GET /conversations: the caller's threads, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let uid = claims.sub.to_string();
    let conversations = blocking(&state, move |db| db.list_conversations_for_user(&uid)).await?;
    Ok(Json(conversations))
}

/// GET /conversations/{conversation_id}
pub async fn get_conversation(
    State(state): State<AppState>,
    ApiPath(conversation_id): ApiPath<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Conversation>> {
    let conversation = load_for_participant(&state, &conversation_id, claims.sub).await?;
    Ok(Json(conversation))
}

/// GET /conversations/{conversation_id}/messages: oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    ApiPath(conversation_id): ApiPath<String>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversation = load_for_participant(&state, &conversation_id, claims.sub).await?;
    let before = parse_cursor(query.before.as_deref(), query.before_id)?;
    let limit = query.limit.min(MAX_PAGE);

    let messages = blocking(&state, move |db| {
        db.get_messages(&conversation.id, limit, before.as_ref())
    })
    .await?;
    Ok(Json(messages))
}

/// POST /conversations/{conversation_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    ApiPath(conversation_id): ApiPath<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Message can't be empty"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let conversation = load_for_participant(&state, &conversation_id, claims.sub).await?;

    let message = Message {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        sender_id: claims.sub,
        text: text.to_string(),
        created_at: chrono::Utc::now(),
    };

    let to_insert = message.clone();
    let conversation = blocking(&state, move |db| db.insert_message(&to_insert)).await?;

    let participants = conversation.participants;
    state
        .dispatcher
        .send_to_users(&participants, GatewayEvent::MessageCreate {
            message: message.clone(),
        })
        .await;
    state
        .dispatcher
        .send_to_users(&participants, GatewayEvent::ConversationUpdate { conversation })
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Resolve a conversation the caller takes part in.
///
/// A malformed id is a 404. An existing thread between two other people is a
/// 403, and so is a well-formed id that doesn't include the caller at all.
async fn load_for_participant(
    state: &AppState,
    conversation_id: &str,
    user_id: Uuid,
) -> ApiResult<Conversation> {
    let (a, b) = conversation_participants(conversation_id)
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;
    if a != user_id && b != user_id {
        return Err(ApiError::forbidden("You are not part of this conversation"));
    }

    let id = conversation_id.to_string();
    let conversation = blocking(state, move |db| db.get_conversation(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversation.has_participant(user_id) {
        return Err(ApiError::forbidden("You are not part of this conversation"));
    }
    Ok(conversation)
}
