//! Handlers for the `/users` resource.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::types::{DbId, Timestamp};
use tally_db::models::user::User;

use crate::error::AppResult;
use crate::handlers::auth::clear_session_cookie;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: DbId,
    pub handle: String,
    pub created_at: Timestamp,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            handle: user.handle,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HandleQuery {
    pub handle: String,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangeHandleRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// GET /api/v1/users/exists?handle=
pub async fn exists(
    State(state): State<AppState>,
    Query(query): Query<HandleQuery>,
) -> AppResult<Json<DataResponse<ExistsResponse>>> {
    let exists = state.auth.handle_exists(&query.handle).await?;
    Ok(Json(DataResponse {
        data: ExistsResponse { exists },
    }))
}

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<UserInfo>>> {
    let user = state.auth.current_user(user.user_id).await?;
    Ok(Json(DataResponse {
        data: UserInfo::from(user),
    }))
}

/// PATCH /api/v1/users/me/handle
pub async fn change_handle(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ChangeHandleRequest>,
) -> AppResult<StatusCode> {
    state.auth.change_handle(user.user_id, &input.handle).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .auth
        .change_password(user.user_id, &input.old_password, &input.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/users/me
///
/// Delete the account; its sessions go with it.
pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    state.auth.delete_account(user.user_id).await?;
    Ok((StatusCode::NO_CONTENT, clear_session_cookie(&state)?))
}
