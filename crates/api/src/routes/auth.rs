//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /sign-up       -> sign_up
/// POST /pre-session   -> pre_session
/// POST /sign-in       -> sign_in
/// POST /login         -> login (only when legacy sign-in is enabled)
/// GET  /csrf-token    -> csrf_token (requires auth)
/// POST /sign-out      -> sign_out (requires auth)
/// POST /sign-out-all  -> sign_out_all (requires auth)
/// ```
pub fn router(legacy_sign_in_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/pre-session", post(auth::pre_session))
        .route("/sign-in", post(auth::sign_in))
        .route("/csrf-token", get(auth::csrf_token))
        .route("/sign-out", post(auth::sign_out))
        .route("/sign-out-all", post(auth::sign_out_all));

    if legacy_sign_in_enabled {
        router.route("/login", post(auth::login))
    } else {
        router
    }
}
