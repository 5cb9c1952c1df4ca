use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::query::{
    push_filters, push_pagination, push_sort, ColKind, Column, ListQuery,
};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: Option<f32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "tour")]
    pub tour_id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
}

pub const REVIEW_FIELDS: &[Column] = &[
    ("rating", "rating", ColKind::Num),
    ("tour", "tour_id", ColKind::Id),
    ("user", "user_id", ColKind::Id),
    ("createdAt", "created_at", ColKind::Time),
];

const COLUMNS: &str = "id, review, rating, created_at, tour_id, user_id";

impl Review {
    pub async fn list(db: &PgPool, query: &ListQuery) -> sqlx::Result<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM reviews WHERE TRUE"
        ));
        push_filters(&mut qb, &query.filters, REVIEW_FIELDS);
        push_sort(&mut qb, &query.sort, REVIEW_FIELDS);
        push_pagination(&mut qb, query);
        qb.build_query_as::<Review>().fetch_all(db).await
    }

    pub async fn insert(
        db: &PgPool,
        review: &str,
        rating: Option<f32>,
        tour_id: Uuid,
        user_id: Uuid,
    ) -> sqlx::Result<Review> {
        sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO reviews (review, rating, tour_id, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(review)
        .bind(rating)
        .bind(tour_id)
        .bind(user_id)
        .fetch_one(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_references_serialize_under_their_api_names() {
        let review = Review {
            id: Uuid::new_v4(),
            review: "Loved it".into(),
            rating: Some(4.5),
            created_at: OffsetDateTime::now_utc(),
            tour_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&review).unwrap();
        let map = json.as_object().unwrap();
        assert!(map.contains_key("tour"));
        assert!(map.contains_key("user"));
        assert!(!map.contains_key("tourId"));
        assert!(!map.contains_key("userId"));
    }
}
