use serde::{Deserialize, Serializer};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use super::repo::Difficulty;

/// Serializes timestamp arrays as RFC3339 strings, matching the single
/// timestamp fields.
pub fn serialize_rfc3339_vec<S: Serializer>(
    dates: &[OffsetDateTime],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let formatted: Result<Vec<String>, _> = dates
        .iter()
        .map(|d| d.format(&Rfc3339).map_err(serde::ser::Error::custom))
        .collect();
    serializer.collect_seq(formatted?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTourRequest {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: Option<f32>,
    pub ratings_quantity: Option<i32>,
    pub price: f64,
    pub discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// RFC3339 strings; parsed explicitly so bad input yields a 400.
    #[serde(default)]
    pub start_dates: Vec<String>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<serde_json::Value>,
    pub locations: Option<serde_json::Value>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTourRequest {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub ratings_average: Option<f32>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<String>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<serde_json::Value>,
    pub locations: Option<serde_json::Value>,
    pub guides: Option<Vec<Uuid>>,
}
