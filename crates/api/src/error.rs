use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::error::AuthError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`AuthError`] and adds HTTP-specific variants. Domain validation
/// errors from `tally_core` reach handlers through [`AuthError::Validation`].
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error from the auth service.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- AuthError variants ---
            AppError::Auth(auth) => match auth {
                // The reason was logged where it was decided; clients get no detail.
                AuthError::Unauthorized(_) => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "unauthorized".to_string(),
                ),
                AuthError::Conflict => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "handle already taken".to_string(),
                ),
                AuthError::NotFound(entity) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                AuthError::Validation(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_ERROR",
                    msg.clone(),
                ),
                AuthError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal auth error");
                    internal()
                }
            },

            // --- HTTP-specific errors ---
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::auth::error::RejectReason;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn every_reject_reason_renders_identically() {
        let (status, body) = render(AuthError::Unauthorized(RejectReason::CsrfMismatch).into()).await;
        let (other_status, other_body) =
            render(AuthError::Unauthorized(RejectReason::BadCredentials).into()).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, other_body);
        assert_eq!(status, other_status);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn conflict_names_the_handle() {
        let (status, body) = render(AuthError::Conflict.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "handle already taken");
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let (status, body) =
            render(AuthError::Internal("find session: 2 sessions share one token".into()).into())
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn validation_is_unprocessable() {
        let (status, body) = render(AuthError::Validation("too short".into()).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "too short");
    }
}
