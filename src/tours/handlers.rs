use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use time::{format_description::well_known::Rfc3339, Date, Month, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::ApiError,
    query::{project, ListQuery},
    response::Envelope,
    state::AppState,
    tours::{
        dto::{CreateTourRequest, UpdateTourRequest},
        repo::{self, slugify, NewTour, Tour},
    },
    users::repo::User,
};

fn validate_tour(
    name: &str,
    ratings_average: Option<f32>,
    price: f64,
    discount: Option<f64>,
) -> Result<(), ApiError> {
    if name.chars().count() < 5 {
        return Err(ApiError::Validation(
            "A tour name needs at least 5 characters".into(),
        ));
    }
    if name.chars().count() > 50 {
        return Err(ApiError::Validation(
            "A tour name cannot be longer than 50 characters".into(),
        ));
    }
    if let Some(rating) = ratings_average {
        if !(1.0..=5.0).contains(&rating) {
            return Err(ApiError::Validation(
                "A rating must be between 1 and 5".into(),
            ));
        }
    }
    if let Some(discount) = discount {
        if discount >= price {
            return Err(ApiError::Validation(format!(
                "Discount price of ({discount}) is greater than the original price"
            )));
        }
    }
    Ok(())
}

fn parse_start_dates(raw: &[String]) -> Result<Vec<OffsetDateTime>, ApiError> {
    raw.iter()
        .map(|s| {
            OffsetDateTime::parse(s, &Rfc3339)
                .map_err(|_| ApiError::Validation(format!("Invalid start date: {s}")))
        })
        .collect()
}

async fn list_with(
    state: &AppState,
    query: ListQuery,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let tours = Tour::list(&state.db, &query).await?;
    let results = tours.len();
    let documents: Result<Vec<serde_json::Value>, ApiError> = tours
        .into_iter()
        .map(|t| {
            serde_json::to_value(t)
                .map(|v| project(v, &query.fields))
                .map_err(|e| ApiError::Internal(e.into()))
        })
        .collect();
    Ok(Json(Envelope::list(
        serde_json::json!({ "tours": documents? }),
        results,
    )))
}

#[instrument(skip(state))]
pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    list_with(&state, ListQuery::parse(&params)).await
}

/// Preset alias: the five best-rated tours, cheapest first among equals.
#[instrument(skip(state))]
pub async fn top_tours(
    State(state): State<AppState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    params.insert("limit".into(), "5".into());
    params.insert("sort".into(), "-ratingsAverage,price".into());
    params.insert(
        "fields".into(),
        "name,price,ratingsAverage,summary,difficulty".into(),
    );
    list_with(&state, ListQuery::parse(&params)).await
}

#[instrument(skip(state))]
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let tour = Tour::find_visible(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No tour found with that id".into()))?;

    // resolve guide references into user documents
    let guides = User::find_by_ids(&state.db, &tour.guides).await?;
    let mut document =
        serde_json::to_value(&tour).map_err(|e| ApiError::Internal(e.into()))?;
    document["guides"] =
        serde_json::to_value(&guides).map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Json(Envelope::success(
        serde_json::json!({ "tour": document }),
    )))
}

#[instrument(skip(state, payload))]
pub async fn create_tour(
    State(state): State<AppState>,
    Json(payload): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Envelope<serde_json::Value>>), ApiError> {
    let name = payload.name.trim().to_string();
    validate_tour(&name, payload.ratings_average, payload.price, payload.discount)?;

    let tour = NewTour {
        slug: slugify(&name),
        name,
        duration: payload.duration,
        max_group_size: payload.max_group_size,
        difficulty: payload.difficulty,
        ratings_average: payload.ratings_average,
        ratings_quantity: payload.ratings_quantity,
        price: payload.price,
        discount: payload.discount,
        summary: payload.summary,
        description: payload.description,
        image_cover: payload.image_cover,
        images: payload.images,
        start_dates: parse_start_dates(&payload.start_dates)?,
        secret_tour: payload.secret_tour,
        start_location: payload.start_location,
        locations: payload.locations,
        guides: payload.guides,
    };
    let tour = Tour::insert(&state.db, &tour).await?;

    info!(tour_id = %tour.id, "tour created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(serde_json::json!({ "tour": tour }))),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTourRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let existing = Tour::find_visible(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No tour found with that id".into()))?;

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .unwrap_or(existing.name);
    let start_dates = match payload.start_dates {
        Some(raw) => parse_start_dates(&raw)?,
        None => existing.start_dates,
    };

    let merged = NewTour {
        slug: slugify(&name),
        name,
        duration: payload.duration.unwrap_or(existing.duration),
        max_group_size: payload.max_group_size.unwrap_or(existing.max_group_size),
        difficulty: payload.difficulty.unwrap_or(existing.difficulty),
        ratings_average: payload.ratings_average.or(existing.ratings_average),
        ratings_quantity: payload.ratings_quantity.or(existing.ratings_quantity),
        price: payload.price.unwrap_or(existing.price),
        discount: payload.discount.or(existing.discount),
        summary: payload.summary.unwrap_or(existing.summary),
        description: payload.description.or(existing.description),
        image_cover: payload.image_cover.or(existing.image_cover),
        images: payload.images.unwrap_or(existing.images),
        start_dates,
        secret_tour: payload.secret_tour.unwrap_or(existing.secret_tour),
        start_location: payload.start_location.or(existing.start_location),
        locations: payload.locations.or(existing.locations),
        guides: payload.guides.unwrap_or(existing.guides),
    };
    validate_tour(
        &merged.name,
        merged.ratings_average,
        merged.price,
        merged.discount,
    )?;

    let tour = Tour::update(&state.db, id, &merged)
        .await?
        .ok_or_else(|| ApiError::NotFound("No tour found with that id".into()))?;

    info!(tour_id = %tour.id, "tour updated");
    Ok(Json(Envelope::success(serde_json::json!({ "tour": tour }))))
}

#[instrument(skip(state))]
pub async fn delete_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Tour::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("No tour found with that id".into()));
    }
    info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn tour_stats(
    State(state): State<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let stats = repo::stats(&state.db).await?;
    Ok(Json(Envelope::success(serde_json::json!({ "stats": stats }))))
}

#[instrument(skip(state))]
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let from = Date::from_calendar_date(year, Month::January, 1)
        .map_err(|_| ApiError::Validation("Invalid year".into()))?
        .midnight()
        .assume_utc();
    let to = Date::from_calendar_date(year, Month::December, 31)
        .map_err(|_| ApiError::Validation("Invalid year".into()))?
        .with_hms(23, 59, 59)
        .map_err(|_| ApiError::Validation("Invalid year".into()))?
        .assume_utc();

    let plan = repo::monthly_plan(&state.db, from, to).await?;
    Ok(Json(Envelope::success(serde_json::json!({ "plan": plan }))))
}
