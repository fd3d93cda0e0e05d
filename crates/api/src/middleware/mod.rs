//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Resolves the session cookie to a signed-in user.

pub mod auth;
