use axum::{
    extract::{FromRef, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
            UpdatePasswordRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{
            generate_reset_token, hash_password, hash_reset_token, verify_password,
            RESET_TOKEN_TTL,
        },
    },
    config::AppConfig,
    error::ApiError,
    response::Envelope,
    state::AppState,
    users::repo::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ApiError::Validation("This is not a valid email".into()))
    }
}

fn validate_new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "A password needs to contain at least 8 characters".into(),
        ));
    }
    if password.len() > 50 {
        return Err(ApiError::Validation(
            "A password cannot exceed 50 characters".into(),
        ));
    }
    if password != confirm {
        return Err(ApiError::Validation("Your passwords don't match".into()));
    }
    Ok(())
}

/// Success response carrying a fresh token, mirrored into an http-only
/// cookie.
fn token_response(
    status: StatusCode,
    token: String,
    user: Option<User>,
    config: &AppConfig,
) -> Result<Response, ApiError> {
    let mut cookie = format!(
        "jwt={token}; Path=/; HttpOnly; Max-Age={}",
        config.jwt.cookie_ttl_days * 24 * 60 * 60
    );
    if !config.development {
        cookie.push_str("; Secure");
    }
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::Internal(e.into()))?,
    );

    let envelope = match user {
        Some(user) => Envelope::success(serde_json::json!({ "user": user })).with_token(token),
        None => Envelope::token_only(token),
    };
    Ok((status, headers, Json(envelope)).into_response())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::Validation("Please provide a name".into()));
    }
    validate_email(&payload.email)?;
    validate_new_password(&payload.password, &payload.password_confirm)?;

    let hash = hash_password(payload.password).await?;
    let user = User::create(&state.db, &payload.name, &payload.email, &hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    token_response(StatusCode::CREATED, token, Some(user), &state.config)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::Validation(
            "Please provide your email and password".into(),
        ));
    };
    let email = email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Authentication("Incorrect email or password".into()))?;

    if !verify_password(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::Authentication(
            "Incorrect email or password".into(),
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    token_response(StatusCode::OK, token, None, &state.config)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("There is no user with that email".into()))?;

    let (raw_token, digest) = generate_reset_token();
    let expires_at = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    User::set_reset_token(&state.db, user.id, &digest, expires_at).await?;

    let reset_url = format!(
        "{}/api/v1/users/reset/{}",
        state.config.public_url, raw_token
    );
    let message = format!("Password Forgot -> Patch request here: {reset_url}");

    if let Err(e) = state.mailer.send(&user.email, "PW RESET", &message).await {
        // never leave an undeliverable reset token active
        warn!(error = %e, user_id = %user.id, "reset mail failed, clearing token");
        User::clear_reset_token(&state.db, user.id).await?;
        return Err(ApiError::Delivery(
            "There was an error sending the email".into(),
        ));
    }

    info!(user_id = %user.id, "reset token dispatched");
    Ok(Json(Envelope::message("Token send")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let digest = hash_reset_token(&token);
    let user = User::find_by_reset_hash(&state.db, &digest)
        .await?
        .ok_or_else(|| ApiError::Validation("The token is invalid or has expired".into()))?;

    validate_new_password(&payload.password, &payload.password_confirm)?;

    let hash = hash_password(payload.password).await?;
    let user = User::set_password(&state.db, user.id, &hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "password reset");
    token_response(StatusCode::OK, token, None, &state.config)
}

#[instrument(skip(state, current, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response, ApiError> {
    let (Some(password), Some(new_password)) = (payload.password, payload.new_password) else {
        return Err(ApiError::Validation(
            "Please provide your current and your new password".into(),
        ));
    };

    if !verify_password(password, current.password_hash.clone()).await? {
        return Err(ApiError::Authentication(
            "Incorrect email or password".into(),
        ));
    }

    let confirm = payload.password_confirm.unwrap_or_default();
    validate_new_password(&new_password, &confirm)?;

    let hash = hash_password(new_password).await?;
    let user = User::set_password(&state.db, current.id, &hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "password updated");
    token_response(StatusCode::OK, token, None, &state.config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_emails_and_rejects_junk() {
        assert!(is_valid_email("jonas@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@mail.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password("longenough1", "longenough1").is_ok());
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("longenough1", "different1x").is_err());
        let too_long = "x".repeat(51);
        assert!(validate_new_password(&too_long, &too_long).is_err());
    }
}
