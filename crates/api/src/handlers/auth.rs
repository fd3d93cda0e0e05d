//! Handlers for the `/auth` resource (sign-up, pre-session, sign-in, sign-out).

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::cookie::{expired_session_cookie, read_cookie, session_cookie};
use crate::auth::error::{AuthError, RejectReason};
use crate::auth::service::IssuedSession;
use crate::error::{AppError, AppResult};
use crate::handlers::user::UserInfo;
use crate::middleware::auth::{csrf_header, AuthUser};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for sign-up, sign-in, and legacy login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub handle: String,
    pub password: String,
}

/// Body returned whenever a session cookie is issued or recovered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Body returned by sign-out-all.
#[derive(Debug, Serialize)]
pub struct SignOutAllResponse {
    pub revoked: u64,
}

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

/// A single `Set-Cookie` header, usable as a response part.
pub(crate) type CookieHeader = [(HeaderName, HeaderValue); 1];

fn set_session_cookie(state: &AppState, token: &str) -> AppResult<CookieHeader> {
    let cookie = session_cookie(&state.auth.config().cookie, token)
        .map_err(|e| AppError::InternalError(format!("Invalid session cookie: {e}")))?;
    Ok([(SET_COOKIE, cookie)])
}

pub(crate) fn clear_session_cookie(state: &AppState) -> AppResult<CookieHeader> {
    let cookie = expired_session_cookie(&state.auth.config().cookie)
        .map_err(|e| AppError::InternalError(format!("Invalid session cookie: {e}")))?;
    Ok([(SET_COOKIE, cookie)])
}

/// Set the session cookie and return the CSRF token in the body.
fn session_response(state: &AppState, issued: IssuedSession) -> AppResult<impl IntoResponse> {
    let headers = set_session_cookie(state, &issued.token)?;
    Ok((
        headers,
        Json(DataResponse {
            data: CsrfTokenResponse {
                csrf_token: issued.csrf_token,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/sign-up
///
/// Register a user. Does not sign in.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(input): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state.auth.sign_up(&input.handle, &input.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserInfo::from(user),
        }),
    ))
}

/// POST /api/v1/auth/pre-session
///
/// Issue an anonymous pre-session: cookie plus CSRF token for the sign-in form.
pub async fn pre_session(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let issued = state.auth.issue_pre_session().await?;
    session_response(&state, issued)
}

/// POST /api/v1/auth/sign-in
///
/// Promote the pre-session in the cookie. The pre-session's CSRF token must be
/// sent in `X-CSRF-Token`.
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    let pre_session_token = read_cookie(&headers, &state.auth.config().cookie.name)
        .ok_or(AuthError::Unauthorized(RejectReason::MissingCookie))?;
    let csrf = csrf_header(&headers)
        .map_err(AuthError::Unauthorized)?
        .ok_or(AuthError::Unauthorized(RejectReason::MissingCsrfHeader))?;

    let issued = state
        .auth
        .sign_in(&pre_session_token, Some(csrf), &input.handle, &input.password)
        .await?;
    session_response(&state, issued)
}

/// POST /api/v1/auth/login
///
/// Single-step sign-in without a pre-session. Only mounted when legacy
/// sign-in is enabled.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    let issued = state
        .auth
        .sign_in_direct(&input.handle, &input.password)
        .await?;
    session_response(&state, issued)
}

/// GET /api/v1/auth/csrf-token
///
/// Recover the CSRF token of the current session.
pub async fn csrf_token(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<CsrfTokenResponse>>> {
    let csrf_token = state.auth.csrf_token(&user.session_token).await?;
    Ok(Json(DataResponse {
        data: CsrfTokenResponse { csrf_token },
    }))
}

/// POST /api/v1/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    state.auth.sign_out(&user.session_token).await?;
    Ok((StatusCode::NO_CONTENT, clear_session_cookie(&state)?))
}

/// POST /api/v1/auth/sign-out-all
///
/// Revoke every live session of the current user, this one included.
pub async fn sign_out_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let revoked = state.auth.sign_out_all(user.user_id, true).await?;
    Ok((
        clear_session_cookie(&state)?,
        Json(DataResponse {
            data: SignOutAllResponse { revoked },
        }),
    ))
}
