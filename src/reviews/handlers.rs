use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::ApiError,
    query::{project, ListQuery},
    response::Envelope,
    state::AppState,
    reviews::repo::Review,
    tours::repo::Tour,
};

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub review: String,
    pub rating: Option<f32>,
    pub tour: Uuid,
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let query = ListQuery::parse(&params);
    let reviews = Review::list(&state.db, &query).await?;
    let results = reviews.len();
    let documents: Result<Vec<serde_json::Value>, ApiError> = reviews
        .into_iter()
        .map(|r| {
            serde_json::to_value(r)
                .map(|v| project(v, &query.fields))
                .map_err(|e| ApiError::Internal(e.into()))
        })
        .collect();
    Ok(Json(Envelope::list(
        serde_json::json!({ "reviews": documents? }),
        results,
    )))
}

#[instrument(skip(state, current, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Envelope<serde_json::Value>>), ApiError> {
    if payload.review.trim().is_empty() {
        return Err(ApiError::Validation("You must provide a review".into()));
    }
    if let Some(rating) = payload.rating {
        if !(1.0..=5.0).contains(&rating) {
            return Err(ApiError::Validation(
                "A rating must be between 1 and 5".into(),
            ));
        }
    }

    // the referenced tour must exist and be visible
    Tour::find_visible(&state.db, payload.tour)
        .await?
        .ok_or_else(|| ApiError::NotFound("No tour found with that id".into()))?;

    let review = Review::insert(
        &state.db,
        payload.review.trim(),
        payload.rating,
        payload.tour,
        current.id,
    )
    .await?;

    info!(review_id = %review.id, user_id = %current.id, "review created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(serde_json::json!({ "review": review }))),
    ))
}
