use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Router,
};

use crate::auth::extractors::{authenticate, require_roles};
use crate::state::AppState;
use crate::users::repo::Role;

pub mod handlers;
pub mod repo;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/reviews", get(handlers::list_reviews))
        .route(
            "/reviews",
            post(handlers::create_review)
                .route_layer(middleware::from_fn(|req: Request, next: Next| {
                    require_roles(&[Role::User], req, next)
                }))
                .route_layer(middleware::from_fn_with_state(state, authenticate)),
        )
}
