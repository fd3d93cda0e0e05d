//! Repository for the `sessions` table (the session store).
//!
//! Revocation never deletes: sign-out and sign-out-all only pull `expires_at`
//! back. Rows disappear solely through [`SessionRepo::delete_expired`].

use chrono::Utc;
use sqlx::PgPool;
use tally_core::types::{DbId, Timestamp};

use crate::models::session::{CreateSession, PromoteSession, Session, SessionOwner, SessionRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token, csrf_token, expires_at, created_at, updated_at";

/// Outcome of [`SessionRepo::promote`].
#[derive(Debug)]
pub enum Promotion {
    /// The pre-session was narrowed and the new active session committed.
    Promoted(Session),
    /// The pre-session was missing, already owned, or dead once locked.
    /// Nothing was written.
    NotPromotable,
    /// More than one row matched the pre-session token. Nothing was written.
    Ambiguous(u64),
}

/// Provides storage operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (id, user_id, token, csrf_token, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(input.id)
            .bind(input.owner.to_column())
            .bind(&input.token)
            .bind(&input.csrf_token)
            .bind(input.expires_at)
            .bind(input.now)
            .fetch_one(pool)
            .await?;
        Ok(row.into())
    }

    /// Find sessions by token, live or not.
    ///
    /// Returns up to two rows so callers can detect a broken uniqueness invariant.
    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE token = $1 LIMIT 2");
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .bind(token)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    /// List every session owned by a user, newest first.
    pub async fn find_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Session>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, SessionRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    /// Extend a session to `expires_at`, provided its expiry is still the
    /// `expected_expires_at` the caller read.
    ///
    /// A concurrent sign-out changes `expires_at`, so the refresh then matches
    /// nothing and cannot resurrect the session. Returns the number of rows updated.
    pub async fn refresh(
        pool: &PgPool,
        token: &str,
        expected_expires_at: Timestamp,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = $3, updated_at = $4
             WHERE token = $1 AND expires_at = $2",
        )
        .bind(token)
        .bind(expected_expires_at)
        .bind(expires_at)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Narrow a session's expiry to `now` (never later than it already was).
    ///
    /// Returns the number of rows updated.
    pub async fn expire(pool: &PgPool, token: &str, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = LEAST(expires_at, $2), updated_at = $2
             WHERE token = $1",
        )
        .bind(token)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Narrow every live session owned by `user_id` to `now`.
    ///
    /// Already-dead rows are not touched. Returns the number of sessions revoked.
    pub async fn expire_all_for_user(
        pool: &PgPool,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = $2, updated_at = $2
             WHERE user_id = $1 AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Promote a pre-session: narrow it to now and insert the owned session
    /// in one transaction.
    ///
    /// The pre-session row is locked before the clock is read, so a competing
    /// promotion that committed first has already narrowed it to an instant
    /// no later than ours and the row is seen as dead. Every caller but the
    /// first therefore gets [`Promotion::NotPromotable`].
    pub async fn promote(
        pool: &PgPool,
        pre_session_token: &str,
        input: &PromoteSession,
    ) -> Result<Promotion, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM sessions WHERE token = $1 LIMIT 2 FOR UPDATE");
        let locked: Vec<Session> = sqlx::query_as::<_, SessionRow>(&query)
            .bind(pre_session_token)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Session::from)
            .collect();

        let now = Utc::now();

        let pre_session = match locked.as_slice() {
            [single] => single,
            [] => {
                tx.rollback().await?;
                return Ok(Promotion::NotPromotable);
            }
            many => {
                let count = many.len() as u64;
                tx.rollback().await?;
                return Ok(Promotion::Ambiguous(count));
            }
        };

        if pre_session.owner != SessionOwner::Anonymous || !pre_session.is_live(now) {
            tx.rollback().await?;
            return Ok(Promotion::NotPromotable);
        }

        sqlx::query("UPDATE sessions SET expires_at = $2, updated_at = $2 WHERE id = $1")
            .bind(pre_session.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO sessions (id, user_id, token, csrf_token, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&query)
            .bind(input.id)
            .bind(input.user_id)
            .bind(&input.token)
            .bind(&input.csrf_token)
            .bind(now + input.lifetime)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Promotion::Promoted(row.into()))
    }

    /// Delete sessions that expired before `now`. Returns the count of deleted rows.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
