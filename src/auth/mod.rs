use axum::{
    middleware,
    routing::{patch, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(handlers::signup))
        .route("/users/login", post(handlers::login))
        .route("/users/forgot", post(handlers::forgot_password))
        .route("/users/reset/:token", patch(handlers::reset_password))
        .route(
            "/users/update",
            patch(handlers::update_password)
                .layer(middleware::from_fn_with_state(state, extractors::authenticate)),
        )
}
