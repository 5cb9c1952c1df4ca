use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    auth::jwt::JwtKeys,
    error::ApiError,
    state::AppState,
    users::repo::{Role, User},
};

/// The identity resolved by [`authenticate`], available to downstream
/// handlers as an extractor.
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Route-protection middleware. Walks the whole chain: bearer token →
/// signature/expiry → user still exists → password unchanged since
/// issuance → identity attached to the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        ApiError::Authentication("You need to log in to request this resource".into())
    })?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(&token).map_err(|e| {
        warn!("token rejected");
        ApiError::from(e)
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Authentication("The user no longer exists".into()))?;

    if user.password_changed_after(claims.iat as i64) {
        return Err(ApiError::Authentication(
            "Password changed - Please log in".into(),
        ));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Role allow-list check; composes after [`authenticate`], which must
/// already have attached the identity.
pub async fn require_roles(
    roles: &'static [Role],
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() else {
        return Err(ApiError::Authentication(
            "You need to log in to request this resource".into(),
        ));
    };
    if !roles.contains(&user.role) {
        return Err(ApiError::Authorization(
            "You do not have permissions here".into(),
        ));
    }
    Ok(next.run(req).await)
}

/// Bearer token from the Authorization header, falling back to the `jwt`
/// cookie set at login.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("jwt="))
        })
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            ApiError::Authentication("You need to log in to request this resource".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_reads_the_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_falls_back_to_the_jwt_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwdw=="),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn missing_headers_yield_no_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    mod middleware_chain {
        use super::super::*;
        use axum::{
            body::Body,
            http::{Request as HttpRequest, StatusCode},
            middleware,
            routing::get,
            Router,
        };
        use time::OffsetDateTime;
        use tower::ServiceExt;
        use uuid::Uuid;

        fn test_user(role: Role) -> User {
            User {
                id: Uuid::new_v4(),
                name: "Jonas".into(),
                email: "jonas@example.com".into(),
                password_hash: "hash".into(),
                role,
                created_at: OffsetDateTime::now_utc(),
                password_changed_at: None,
                password_reset_token_hash: None,
                password_reset_expires_at: None,
                active: true,
            }
        }

        async fn ok_handler() -> &'static str {
            "ok"
        }

        /// Router with the role gate only; the identity is injected by a
        /// stub layer standing in for `authenticate`.
        fn restricted_router(user: User) -> Router {
            let attach = middleware::from_fn(move |mut req: Request, next: Next| {
                let user = user.clone();
                async move {
                    req.extensions_mut().insert(CurrentUser(user));
                    next.run(req).await
                }
            });
            Router::new()
                .route("/", get(ok_handler))
                .route_layer(middleware::from_fn(|req: Request, next: Next| {
                    require_roles(&[Role::Admin, Role::Guide], req, next)
                }))
                .layer(attach)
        }

        #[tokio::test]
        async fn restrict_to_passes_allowed_roles_and_rejects_others() {
            for (role, expected) in [
                (Role::Admin, StatusCode::OK),
                (Role::Guide, StatusCode::OK),
                (Role::User, StatusCode::FORBIDDEN),
            ] {
                let response = restricted_router(test_user(role))
                    .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
                    .await
                    .unwrap();
                assert_eq!(response.status(), expected, "role {role:?}");
            }
        }

        #[tokio::test]
        async fn restrict_without_identity_is_unauthorized() {
            let app = Router::new()
                .route("/", get(ok_handler))
                .route_layer(middleware::from_fn(|req: Request, next: Next| {
                    require_roles(&[Role::Admin], req, next)
                }));
            let response = app
                .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn authenticate_rejects_a_request_without_a_token() {
            let state = AppState::fake();
            let app = Router::new()
                .route("/", get(ok_handler))
                .route_layer(middleware::from_fn_with_state(state, authenticate));
            let response = app
                .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        #[tokio::test]
        async fn authenticate_rejects_a_malformed_token_before_touching_the_store() {
            let state = AppState::fake();
            let app = Router::new()
                .route("/", get(ok_handler))
                .route_layer(middleware::from_fn_with_state(state, authenticate));
            let response = app
                .oneshot(
                    HttpRequest::builder()
                        .uri("/")
                        .header("Authorization", "Bearer not.a.token")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
