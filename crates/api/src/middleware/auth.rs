//! Session-cookie authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use tally_core::types::DbId;

use crate::auth::cookie::read_cookie;
use crate::auth::error::{AuthError, RejectReason};
use crate::error::AppError;
use crate::state::AppState;

/// Request header carrying the CSRF token (double-submit pattern).
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Authenticated user resolved from the session cookie.
///
/// Use this as an extractor parameter in any handler that requires a signed-in
/// user:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
///
/// State-changing methods must carry a non-empty `X-CSRF-Token` header; it is
/// checked before the session is looked up. The session is refreshed as a side
/// effect when it is close to expiry.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// The session token that was validated, for handlers that act on the
    /// current session (sign-out).
    pub session_token: String,
}

/// Whether `method` changes server state and therefore requires a CSRF header.
pub fn requires_csrf(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// The `X-CSRF-Token` header value, if present and non-empty.
///
/// A non-empty value that is not visible ASCII can never equal a generated
/// token, so it is rejected as a mismatch rather than treated as absent.
pub fn csrf_header(headers: &HeaderMap) -> Result<Option<&str>, RejectReason> {
    match headers.get(CSRF_HEADER) {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| RejectReason::CsrfMismatch),
    }
}

fn unauthorized(reason: RejectReason) -> AppError {
    tracing::debug!(reason = reason.as_str(), "Request rejected by auth extractor");
    AppError::Auth(AuthError::Unauthorized(reason))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_name = &state.auth.config().cookie.name;
        let session_token = read_cookie(&parts.headers, cookie_name)
            .ok_or_else(|| unauthorized(RejectReason::MissingCookie))?;

        let csrf = csrf_header(&parts.headers).map_err(unauthorized)?;
        if csrf.is_none() && requires_csrf(&parts.method) {
            return Err(unauthorized(RejectReason::MissingCsrfHeader));
        }

        let user_id = state
            .auth
            .validate_and_refresh(&session_token, csrf)
            .await?;

        Ok(AuthUser {
            user_id,
            session_token,
        })
    }
}
