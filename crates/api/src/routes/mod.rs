pub mod auth;
pub mod health;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth
///     /sign-up                     register (POST)
///     /pre-session                 issue pre-session (POST)
///     /sign-in                     promote pre-session (POST)
///     /login                       legacy single-step sign-in (POST, optional)
///     /csrf-token                  recover CSRF token (GET)
///     /sign-out                    revoke current session (POST)
///     /sign-out-all                revoke all sessions (POST)
///
/// /users
///     /exists?handle=              handle availability (GET)
///     /me                          current user (GET, DELETE)
///     /me/handle                   change handle (PATCH)
///     /me/password                 change password (PATCH)
/// ```
pub fn api_routes(legacy_sign_in_enabled: bool) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(legacy_sign_in_enabled))
        .nest("/users", user::router())
}
