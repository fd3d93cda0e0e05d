//! Repository for the `users` table (the credential store).

use sqlx::PgPool;
use tally_core::types::{DbId, Timestamp};

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, handle, password_hash, created_at, updated_at";

/// Name of the unique constraint on `users.handle`.
pub const HANDLE_CONSTRAINT: &str = "uq_users_handle";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (id, handle, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(input.id)
            .bind(&input.handle)
            .bind(&input.password_hash)
            .bind(input.now)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find users by handle (case-sensitive).
    ///
    /// Returns up to two rows so callers can detect a broken uniqueness invariant.
    pub async fn find_by_handle(pool: &PgPool, handle: &str) -> Result<Vec<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE handle = $1 LIMIT 2");
        sqlx::query_as::<_, User>(&query)
            .bind(handle)
            .fetch_all(pool)
            .await
    }

    /// Change a user's handle. Returns the number of rows updated.
    pub async fn update_handle(
        pool: &PgPool,
        id: DbId,
        handle: &str,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET handle = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(handle)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Replace a user's password hash. Returns the number of rows updated.
    pub async fn update_password_hash(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(now)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete a user. Owned sessions go with it (`ON DELETE CASCADE`).
    ///
    /// Returns the number of rows deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
