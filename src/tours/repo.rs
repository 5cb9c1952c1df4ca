use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::query::{
    push_filters, push_pagination, push_sort, ColKind, Column, ListQuery,
};

/// Stored as plain TEXT, not a Postgres enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
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
    pub images: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "super::dto::serialize_rfc3339_vec")]
    pub start_dates: Vec<OffsetDateTime>,
    pub secret_tour: bool,
    pub start_location: Option<serde_json::Value>,
    pub locations: Option<serde_json::Value>,
    pub guides: Vec<Uuid>,
}

/// Insertable/updatable field set; id and created_at stay with the store.
#[derive(Debug, Clone)]
pub struct NewTour {
    pub name: String,
    pub slug: String,
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
    pub images: Vec<String>,
    pub start_dates: Vec<OffsetDateTime>,
    pub secret_tour: bool,
    pub start_location: Option<serde_json::Value>,
    pub locations: Option<serde_json::Value>,
    pub guides: Vec<Uuid>,
}

/// API field → SQL column allow-list for list filtering and sorting.
pub const TOUR_FIELDS: &[Column] = &[
    ("name", "name", ColKind::Text),
    ("slug", "slug", ColKind::Text),
    ("duration", "duration", ColKind::Num),
    ("maxGroupSize", "max_group_size", ColKind::Num),
    ("difficulty", "difficulty", ColKind::Text),
    ("ratingsAverage", "ratings_average", ColKind::Num),
    ("ratingsQuantity", "ratings_quantity", ColKind::Num),
    ("price", "price", ColKind::Num),
    ("discount", "discount", ColKind::Num),
    ("createdAt", "created_at", ColKind::Time),
];

const COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, \
     ratings_average, ratings_quantity, price, discount, summary, description, \
     image_cover, images, created_at, start_dates, secret_tour, start_location, \
     locations, guides";

/// Derives the URL slug the way the API always has: spaces to dashes,
/// lowercased.
pub fn slugify(name: &str) -> String {
    name.split(' ').collect::<Vec<_>>().join("-").to_lowercase()
}

impl Tour {
    /// List read. Secret tours are excluded here, in the read path itself,
    /// regardless of any filters the caller supplied.
    pub async fn list(db: &PgPool, query: &ListQuery) -> sqlx::Result<Vec<Tour>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM tours WHERE secret_tour = FALSE"
        ));
        push_filters(&mut qb, &query.filters, TOUR_FIELDS);
        push_sort(&mut qb, &query.sort, TOUR_FIELDS);
        push_pagination(&mut qb, query);
        qb.build_query_as::<Tour>().fetch_all(db).await
    }

    pub async fn find_visible(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Tour>> {
        sqlx::query_as::<_, Tour>(&format!(
            "SELECT {COLUMNS} FROM tours WHERE id = $1 AND secret_tour = FALSE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn insert(db: &PgPool, tour: &NewTour) -> sqlx::Result<Tour> {
        sqlx::query_as::<_, Tour>(&format!(
            "INSERT INTO tours (name, slug, duration, max_group_size, difficulty, \
             ratings_average, ratings_quantity, price, discount, summary, description, \
             image_cover, images, start_dates, secret_tour, start_location, locations, guides) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {COLUMNS}"
        ))
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(tour.difficulty)
        .bind(tour.ratings_average)
        .bind(tour.ratings_quantity)
        .bind(tour.price)
        .bind(tour.discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(&tour.start_dates)
        .bind(tour.secret_tour)
        .bind(&tour.start_location)
        .bind(&tour.locations)
        .bind(&tour.guides)
        .fetch_one(db)
        .await
    }

    pub async fn update(db: &PgPool, id: Uuid, tour: &NewTour) -> sqlx::Result<Option<Tour>> {
        sqlx::query_as::<_, Tour>(&format!(
            "UPDATE tours SET name = $2, slug = $3, duration = $4, max_group_size = $5, \
             difficulty = $6, ratings_average = $7, ratings_quantity = $8, price = $9, \
             discount = $10, summary = $11, description = $12, image_cover = $13, \
             images = $14, start_dates = $15, secret_tour = $16, start_location = $17, \
             locations = $18, guides = $19 \
             WHERE id = $1 AND secret_tour = FALSE RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(tour.difficulty)
        .bind(tour.ratings_average)
        .bind(tour.ratings_quantity)
        .bind(tour.price)
        .bind(tour.discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(&tour.start_dates)
        .bind(tour.secret_tour)
        .bind(&tour.start_location)
        .bind(&tour.locations)
        .bind(&tour.guides)
        .fetch_optional(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1 AND secret_tour = FALSE")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Aggregate row of GET /tours/stats.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: Difficulty,
    pub num_tours: i64,
    pub avg_rating: Option<f64>,
    pub num_ratings: Option<i64>,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub async fn stats(db: &PgPool) -> sqlx::Result<Vec<TourStats>> {
    sqlx::query_as::<_, TourStats>(
        "SELECT difficulty, COUNT(*) AS num_tours, \
         AVG(ratings_average)::float8 AS avg_rating, \
         SUM(ratings_quantity) AS num_ratings, \
         AVG(price) AS avg_price, MIN(price) AS min_price, MAX(price) AS max_price \
         FROM tours \
         WHERE secret_tour = FALSE AND ratings_average >= 4.5 \
         GROUP BY difficulty \
         ORDER BY difficulty",
    )
    .fetch_all(db)
    .await
}

/// Aggregate row of GET /tours/monthly-plan/:year.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_of_tours: i64,
    pub tours: Vec<String>,
}

pub async fn monthly_plan(
    db: &PgPool,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> sqlx::Result<Vec<MonthlyPlan>> {
    sqlx::query_as::<_, MonthlyPlan>(
        "SELECT EXTRACT(MONTH FROM d)::int AS month, \
         COUNT(*) AS num_of_tours, ARRAY_AGG(t.name) AS tours \
         FROM tours t CROSS JOIN LATERAL UNNEST(t.start_dates) AS d \
         WHERE t.secret_tour = FALSE AND d BETWEEN $1 AND $2 \
         GROUP BY 1 ORDER BY num_of_tours DESC, month LIMIT 6",
    )
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_lowercased_and_dashed() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("Sea Explorer"), "sea-explorer");
        assert_eq!(slugify("single"), "single");
    }

    #[test]
    fn list_sql_always_excludes_secret_tours() {
        let query = ListQuery::default();
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM tours WHERE secret_tour = FALSE"
        ));
        push_filters(&mut qb, &query.filters, TOUR_FIELDS);
        assert!(qb.sql().contains("secret_tour = FALSE"));
    }

    #[test]
    fn secret_tour_is_not_an_allow_listed_filter_field() {
        assert!(!TOUR_FIELDS
            .iter()
            .any(|(name, _, _)| *name == "secretTour" || *name == "secret_tour"));
    }

    #[test]
    fn difficulty_maps_to_the_text_column_type() {
        use sqlx::{Type, TypeInfo};
        let info = <Difficulty as Type<Postgres>>::type_info();
        assert!(info.name().eq_ignore_ascii_case("text"));
        assert!(<Difficulty as Type<Postgres>>::compatible(
            &<String as Type<Postgres>>::type_info()
        ));
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Difficulty::Difficult).unwrap(),
            serde_json::json!("difficult")
        );
        let parsed: Difficulty = serde_json::from_str("\"easy\"").unwrap();
        assert_eq!(parsed, Difficulty::Easy);
    }
}
