use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument};

use crate::{
    auth::{extractors::CurrentUser, handlers::is_valid_email},
    error::ApiError,
    response::Envelope,
    state::AppState,
    users::{dto::UpdateMeRequest, repo::User},
};

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let users = User::list(&state.db).await?;
    let results = users.len();
    Ok(Json(Envelope::list(
        serde_json::json!({ "users": users }),
        results,
    )))
}

#[instrument(skip(current))]
pub async fn get_me(
    CurrentUser(current): CurrentUser,
) -> Json<Envelope<serde_json::Value>> {
    Json(Envelope::success(serde_json::json!({ "user": current })))
}

#[instrument(skip(state, current, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    if payload.password.is_some() || payload.password_confirm.is_some() {
        return Err(ApiError::Validation(
            "This route is not for password updates".into(),
        ));
    }

    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(ApiError::Validation("This is not a valid email".into()));
        }
    }

    let user = User::update_profile(
        &state.db,
        current.id,
        payload.name.as_deref(),
        email.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::Authentication("The user no longer exists".into()))?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(Envelope::success(serde_json::json!({ "user": user }))))
}

#[instrument(skip(state, current))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
) -> Result<StatusCode, ApiError> {
    User::deactivate(&state.db, current.id).await?;
    info!(user_id = %current.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}
