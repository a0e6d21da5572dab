use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use kicks_gateway::verify_token;

use crate::error::ApiError;
use crate::state::AppState;

pub use kicks_types::api::Claims;

const LOGIN_PROMPT: &str = "Please log in to continue";
const CHAT_LOGIN_PROMPT: &str = "Please log in to message the seller";

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, LOGIN_PROMPT).await
}

/// Same as `require_auth`, with the chat-specific login prompt.
pub async fn require_auth_for_chat(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, req, next, CHAT_LOGIN_PROMPT).await
}

async fn authenticate(
    state: &AppState,
    mut req: Request,
    next: Next,
    prompt: &str,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized(prompt.to_string()))?;

    let claims = verify_token(token, &state.jwt_secret)
        .ok_or_else(|| ApiError::Unauthorized(prompt.to_string()))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
