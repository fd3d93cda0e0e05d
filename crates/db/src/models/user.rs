//! User entity model and DTOs.

use sqlx::FromRow;
use tally_core::types::{DbId, Timestamp};

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses or logs.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub handle: String,
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// DTO for creating a new user.
pub struct CreateUser {
    pub id: DbId,
    pub handle: String,
    pub password_hash: String,
    pub now: Timestamp,
}
