use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{delete, get},
    Router,
};

use crate::auth::extractors::{authenticate, require_roles};
use crate::state::AppState;
use crate::users::repo::Role;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tours/top-tours", get(handlers::top_tours))
        .route("/tours/tour-stats", get(handlers::tour_stats))
        .route("/tours/monthly-plan/:year", get(handlers::monthly_plan))
        .route(
            "/tours",
            get(handlers::list_tours).post(handlers::create_tour),
        )
        .route(
            "/tours/:id",
            get(handlers::get_tour).patch(handlers::update_tour),
        )
        .route(
            "/tours/:id",
            delete(handlers::delete_tour)
                .route_layer(middleware::from_fn(|req: Request, next: Next| {
                    require_roles(&[Role::Admin, Role::Guide], req, next)
                }))
                .route_layer(middleware::from_fn_with_state(state, authenticate)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn stats_route_lives_under_tour_stats() {
        let state = AppState::fake();
        let app = router(state.clone()).with_state(state);

        let known = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/tours/tour-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(known.status(), StatusCode::NOT_FOUND);

        // the old path falls through to /tours/:id, where "stats" is not
        // a valid tour id
        let gone = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/tours/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::BAD_REQUEST);
    }
}
