use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kicks_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    VerifyEmailRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::{AppState, blocking};
use crate::storage::sha256_hex;

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_DISPLAY_NAME_LEN: usize = 50;
const TOKEN_TTL_DAYS: i64 = 30;
const VERIFICATION_TTL_HOURS: i64 = 24;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() || req.confirm_password.is_empty() {
        return Err(ApiError::bad_request("Fill in all fields!"));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::bad_request("Enter a valid email address"));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::bad_request("Passwords don't match!"));
    }
    validate_password(&req.password)?;

    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => validate_display_name(name)?,
        _ => default_display_name(&email),
    };

    let lookup = email.clone();
    if blocking(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "An account with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    // Two registrations can pass the lookup above at the same time; the
    // UNIQUE constraint decides which one wins.
    let row_email = email.clone();
    let created = blocking(&state, move |db| {
        db.create_user(
            &user_id.to_string(),
            &row_email,
            &password_hash,
            &display_name,
            chrono::Utc::now(),
        )
    })
    .await?;
    if !created {
        return Err(ApiError::Conflict(
            "An account with this email already exists".into(),
        ));
    }

    info!("Registered user {}", user_id);
    issue_verification(&state, user_id).await?;
    let token = create_token(&state.jwt_secret, user_id, &email)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let email = normalize_email(&req.email);
    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password)? {
        warn!("Failed login for {}", user.id);
        return Err(invalid());
    }

    let user_id = user.uuid()?;
    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(LoginResponse {
        user_id,
        display_name: user.display_name,
        token,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&req.current_password, &user.password)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }
    validate_password(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    blocking(&state, move |db| db.update_password(&user.id, &password_hash)).await?;

    info!("Password changed for {}", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/verify-email: redeem the token from a verification link.
pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> ApiResult<StatusCode> {
    let token_hash = sha256_hex(req.token.trim().as_bytes());
    let verified = blocking(&state, move |db| {
        db.consume_verification_token(&token_hash, chrono::Utc::now())
    })
    .await?
    .ok_or_else(|| ApiError::bad_request("Verification link is invalid or has expired"))?;

    info!("Verified email for {}", verified);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/verify-email/resend: issue a fresh link for the caller.
pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.email_verified {
        return Err(ApiError::Conflict("Your email is already verified".into()));
    }

    issue_verification(&state, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store a new verification token and hand it to the outbound mail log.
/// Only the token's hash is persisted.
async fn issue_verification(state: &AppState, user_id: Uuid) -> ApiResult<()> {
    let token = Uuid::new_v4().simple().to_string();
    let token_hash = sha256_hex(token.as_bytes());
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(VERIFICATION_TTL_HOURS);

    blocking(state, move |db| {
        db.purge_expired_verifications(chrono::Utc::now())?;
        db.insert_verification_token(&user_id.to_string(), &token_hash, expires_at)
    })
    .await?;

    info!("Issued email verification for {}", user_id);
    debug!("Verification token for {}: {}", user_id, token);
    Ok(())
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Hash a password with Argon2id.
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
}

fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub(crate) fn validate_display_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Display name must be 1-{} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(' '),
        None => false,
    }
}

/// Local part of the email, used when no display name is given.
fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
