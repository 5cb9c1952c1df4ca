use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{delete, get, patch},
    Router,
};

use crate::auth::extractors::{authenticate, require_roles};
use crate::state::AppState;
use crate::users::repo::Role;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/users", get(handlers::list_users))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            require_roles(&[Role::Admin], req, next)
        }))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let me = Router::new()
        .route("/users/me", get(handlers::get_me))
        .route("/users/updateUser", patch(handlers::update_me))
        .route("/users/deleteUser", delete(handlers::delete_me))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    Router::new().merge(admin).merge(me)
}
