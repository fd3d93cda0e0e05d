//! Route definitions for the `/users` resource.

use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::user;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// GET    /exists       -> exists
/// GET    /me           -> me (requires auth)
/// DELETE /me           -> delete_me (requires auth)
/// PATCH  /me/handle    -> change_handle (requires auth)
/// PATCH  /me/password  -> change_password (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exists", get(user::exists))
        .route("/me", get(user::me).delete(user::delete_me))
        .route("/me/handle", patch(user::change_handle))
        .route("/me/password", patch(user::change_password))
}
