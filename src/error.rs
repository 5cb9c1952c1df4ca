use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Latched once at startup; development mode returns verbose error bodies.
static VERBOSE_ERRORS: OnceLock<bool> = OnceLock::new();

pub fn set_verbose_errors(verbose: bool) {
    let _ = VERBOSE_ERRORS.set(verbose);
}

fn verbose_errors() -> bool {
    VERBOSE_ERRORS.get().copied().unwrap_or(false)
}

/// Every handler fault funnels into this taxonomy; `IntoResponse` is the
/// process-wide error boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Duplicate field value: \"{0}\". Please use an other value.")]
    DuplicateKey(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Delivery(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateKey(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Delivery(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operational errors are raised deliberately by business logic and may
    /// be shown to the caller verbatim; everything else is collapsed.
    fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Internal(_))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Postgres unique-constraint violation
            if db_err.code().as_deref() == Some("23505") {
                let field = db_err.constraint().unwrap_or("unique field").to_string();
                return ApiError::DuplicateKey(field);
            }
        }
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if verbose_errors() {
            let body = json!({
                "status": "error",
                "message": self.to_string(),
                "error": format!("{self:?}"),
                "stack": match &self {
                    ApiError::Internal(e) => format!("{:?}", e.backtrace()),
                    _ => String::new(),
                },
            });
            return (status, Json(body)).into_response();
        }

        let message = if self.is_operational() {
            self.to_string()
        } else {
            error!(error = ?self, "unhandled internal error");
            "Something went wrong on our side".to_string()
        };

        let body = json!({ "status": "error", "message": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DuplicateKey("email".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authentication("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Authorization("role".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Delivery("mail".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_are_not_operational() {
        assert!(!ApiError::Internal(anyhow::anyhow!("boom")).is_operational());
        assert!(ApiError::Delivery("mail down".into()).is_operational());
        assert!(ApiError::NotFound("missing".into()).is_operational());
    }

    #[test]
    fn duplicate_key_message_names_the_field() {
        let err = ApiError::DuplicateKey("users_email_key".into());
        assert!(err.to_string().contains("users_email_key"));
    }
}
