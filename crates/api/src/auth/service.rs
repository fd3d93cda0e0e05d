//! The session-based authentication service.
//!
//! A session row starts life as an anonymous *pre-session* that only carries a
//! CSRF token into the sign-in request. Sign-in promotes it: the pre-session is
//! narrowed to dead and a user-owned session is inserted in one transaction.
//! Every later request goes through [`AuthService::validate_and_refresh`].
//!
//! Revocation never deletes rows. Sign-out moves `expires_at` back to now and
//! the background sweep removes dead rows later.

use chrono::Utc;
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use tally_core::credentials::{validate_handle, validate_password};
use tally_core::token::TokenGenerator;
use tally_core::types::{new_id, DbId, Timestamp};
use tally_db::is_unique_violation;
use tally_db::models::session::{CreateSession, PromoteSession, Session, SessionOwner};
use tally_db::models::user::{CreateUser, User};
use tally_db::repositories::user_repo::HANDLE_CONSTRAINT;
use tally_db::repositories::{Promotion, SessionRepo, UserRepo};

use super::config::{AuthConfig, RehashPolicy};
use super::error::{AuthError, AuthResult, RejectReason};
use super::password::PasswordHasher;

/// Verified against when a sign-in names an unknown handle.
const DUMMY_PASSWORD: &str = "tally-dummy-password";

/// Tokens handed back after a session row is created.
#[derive(Clone)]
pub struct IssuedSession {
    /// Goes into the session cookie.
    pub token: String,
    /// Goes into the response body, never a cookie.
    pub csrf_token: String,
    pub expires_at: Timestamp,
}

impl std::fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSession")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Whether a live session with `remaining` lifetime should be extended.
pub fn should_refresh(remaining: chrono::Duration, threshold: chrono::Duration) -> bool {
    remaining < threshold
}

/// Compare a caller-supplied CSRF token with the stored one.
///
/// An absent or empty value counts as not supplied and passes; requiring the
/// header on mutating methods is the middleware's job. Supplied values are
/// compared in constant time.
fn csrf_matches(supplied: Option<&str>, stored: &str) -> bool {
    match supplied {
        None | Some("") => true,
        Some(value) => value.as_bytes().ct_eq(stored.as_bytes()).into(),
    }
}

fn reject(operation: &'static str, reason: RejectReason) -> AuthError {
    match reason {
        RejectReason::CsrfMismatch
        | RejectReason::AlreadyPromoted
        | RejectReason::PromotionRaced => {
            tracing::warn!(operation, reason = reason.as_str(), "Authentication rejected");
        }
        _ => {
            tracing::debug!(operation, reason = reason.as_str(), "Authentication rejected");
        }
    }
    AuthError::Unauthorized(reason)
}

/// Stateless service over the user and session stores.
///
/// All configuration is fixed at construction; nothing is read from the
/// environment at call time.
pub struct AuthService {
    pool: PgPool,
    config: AuthConfig,
    hasher: PasswordHasher,
    session_tokens: TokenGenerator,
    csrf_tokens: TokenGenerator,
    /// Hash of [`DUMMY_PASSWORD`] at the configured cost. Sign-in verifies
    /// against it when the handle does not exist, so a missing user costs as
    /// much time as a wrong password and handles cannot be probed by timing.
    /// Do not short-circuit this.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(pool: PgPool, config: AuthConfig) -> AuthResult<Self> {
        let hasher = PasswordHasher::new(config.password_hash_cost, config.password_hash_memory_kib)
            .map_err(|e| AuthError::Validation(format!("Invalid password hash parameters: {e}")))?;
        let session_tokens =
            TokenGenerator::new(config.session_token_length, &config.session_token_charset)?;
        let csrf_tokens = TokenGenerator::new(config.csrf_token_length, &config.csrf_token_charset)?;
        let dummy_hash = hasher
            .hash(DUMMY_PASSWORD)
            .map_err(|e| AuthError::Internal(format!("Failed to hash dummy password: {e}")))?;

        Ok(Self {
            pool,
            config,
            hasher,
            session_tokens,
            csrf_tokens,
            dummy_hash,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ---- accounts ----

    /// Register a new user. Does not sign them in.
    pub async fn sign_up(&self, handle: &str, password: &str) -> AuthResult<User> {
        validate_handle(handle)?;
        validate_password(password)?;

        if self.handle_exists(handle).await? {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hash_password(password).await?;
        let input = CreateUser {
            id: new_id(),
            handle: handle.to_string(),
            password_hash,
            now: Utc::now(),
        };

        // A concurrent sign-up can still win between the check and the insert.
        let user = UserRepo::create(&self.pool, &input)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, HANDLE_CONSTRAINT) {
                    AuthError::Conflict
                } else {
                    AuthError::storage("create user", e)
                }
            })?;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Whether `handle` is registered. Exact, case-sensitive match.
    pub async fn handle_exists(&self, handle: &str) -> AuthResult<bool> {
        Ok(self.find_user_by_handle(handle).await?.is_some())
    }

    pub async fn current_user(&self, user_id: DbId) -> AuthResult<User> {
        UserRepo::find_by_id(&self.pool, user_id)
            .await
            .map_err(|e| AuthError::storage("find user", e))?
            .ok_or(AuthError::NotFound("user"))
    }

    pub async fn change_handle(&self, user_id: DbId, new_handle: &str) -> AuthResult<()> {
        validate_handle(new_handle)?;

        let user = self.current_user(user_id).await?;
        if user.handle == new_handle {
            return Err(AuthError::Validation(
                "New handle must differ from the current one".to_string(),
            ));
        }
        if self.handle_exists(new_handle).await? {
            return Err(AuthError::Conflict);
        }

        let rows = UserRepo::update_handle(&self.pool, user_id, new_handle, Utc::now())
            .await
            .map_err(|e| {
                if is_unique_violation(&e, HANDLE_CONSTRAINT) {
                    AuthError::Conflict
                } else {
                    AuthError::storage("update handle", e)
                }
            })?;
        expect_single_row("update handle", rows)?;

        tracing::info!(user_id = %user_id, "Handle changed");
        Ok(())
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: DbId,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        validate_password(new_password)?;

        let user = self.current_user(user_id).await?;
        if !self.verify_password(old_password, &user.password_hash).await? {
            return Err(reject("change_password", RejectReason::BadCredentials));
        }
        if old_password == new_password {
            return Err(AuthError::Validation(
                "New password must differ from the current one".to_string(),
            ));
        }

        let password_hash = self.hash_password(new_password).await?;
        let rows = UserRepo::update_password_hash(&self.pool, user_id, &password_hash, Utc::now())
            .await
            .map_err(|e| AuthError::storage("update password hash", e))?;
        expect_single_row("update password hash", rows)?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Delete the user. Their sessions are removed by the storage cascade.
    pub async fn delete_account(&self, user_id: DbId) -> AuthResult<()> {
        let rows = UserRepo::delete(&self.pool, user_id)
            .await
            .map_err(|e| AuthError::storage("delete user", e))?;
        if rows == 0 {
            return Err(AuthError::NotFound("user"));
        }
        expect_single_row("delete user", rows)?;

        tracing::info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    // ---- sessions ----

    /// Create an anonymous pre-session.
    pub async fn issue_pre_session(&self) -> AuthResult<IssuedSession> {
        let now = Utc::now();
        self.create_session(SessionOwner::Anonymous, now + self.config.pre_session_lifetime(), now)
            .await
    }

    /// Promote a pre-session to an active session for the credentials given.
    ///
    /// Every rejection is [`AuthError::Unauthorized`]; the reason only reaches
    /// the logs. A pre-session promotes at most once, even under concurrent
    /// sign-ins with the same token.
    pub async fn sign_in(
        &self,
        pre_session_token: &str,
        csrf_token: Option<&str>,
        handle: &str,
        password: &str,
    ) -> AuthResult<IssuedSession> {
        const OP: &str = "sign_in";

        let pre_session = self
            .find_session(pre_session_token)
            .await?
            .ok_or_else(|| reject(OP, RejectReason::UnknownToken))?;
        if pre_session.owner != SessionOwner::Anonymous {
            return Err(reject(OP, RejectReason::AlreadyPromoted));
        }
        if !csrf_matches(csrf_token, &pre_session.csrf_token) {
            return Err(reject(OP, RejectReason::CsrfMismatch));
        }
        if !pre_session.is_live(Utc::now()) {
            return Err(reject(OP, RejectReason::Expired));
        }

        let user = self.authenticate(OP, handle, password).await?;

        let input = PromoteSession {
            id: new_id(),
            user_id: user.id,
            token: self.session_tokens.generate(),
            csrf_token: self.csrf_tokens.generate(),
            lifetime: self.config.session_lifetime(),
        };
        // The liveness checks above are repeated under a row lock here.
        let promotion = SessionRepo::promote(&self.pool, pre_session_token, &input)
            .await
            .map_err(|e| AuthError::storage("promote session", e))?;

        match promotion {
            Promotion::Promoted(session) => {
                tracing::info!(user_id = %user.id, "User signed in");
                Ok(issued(session))
            }
            Promotion::NotPromotable => Err(reject(OP, RejectReason::PromotionRaced)),
            Promotion::Ambiguous(count) => Err(AuthError::Internal(format!(
                "promote session: {count} sessions share one token"
            ))),
        }
    }

    /// Single-step sign-in that creates an active session without a
    /// pre-session. Only available when enabled in configuration.
    pub async fn sign_in_direct(&self, handle: &str, password: &str) -> AuthResult<IssuedSession> {
        if !self.config.legacy_sign_in_enabled {
            return Err(AuthError::NotFound("legacy sign-in"));
        }

        let user = self.authenticate("sign_in_direct", handle, password).await?;
        let now = Utc::now();
        let session = self
            .create_session(
                SessionOwner::Owned(user.id),
                now + self.config.session_lifetime(),
                now,
            )
            .await?;

        tracing::info!(user_id = %user.id, "User signed in (legacy)");
        Ok(session)
    }

    /// Resolve a session token to its user, extending the session when it is
    /// close to expiry.
    ///
    /// `csrf_token` is compared only when non-empty.
    pub async fn validate_and_refresh(
        &self,
        session_token: &str,
        csrf_token: Option<&str>,
    ) -> AuthResult<DbId> {
        const OP: &str = "validate";

        let session = self
            .find_session(session_token)
            .await?
            .ok_or_else(|| reject(OP, RejectReason::UnknownToken))?;
        let SessionOwner::Owned(user_id) = session.owner else {
            return Err(reject(OP, RejectReason::PreSession));
        };
        if !csrf_matches(csrf_token, &session.csrf_token) {
            return Err(reject(OP, RejectReason::CsrfMismatch));
        }

        let now = Utc::now();
        if !session.is_live(now) {
            return Err(reject(OP, RejectReason::Expired));
        }

        if should_refresh(session.remaining(now), self.config.session_refresh_threshold()) {
            let rows = SessionRepo::refresh(
                &self.pool,
                session_token,
                session.expires_at,
                now + self.config.session_lifetime(),
                now,
            )
            .await
            .map_err(|e| AuthError::storage("refresh session", e))?;

            if rows == 0 {
                // Expiry moved underneath us: a concurrent refresh or a sign-out.
                let current = self.find_session(session_token).await?;
                if !current.is_some_and(|s| s.is_live(Utc::now())) {
                    return Err(reject(OP, RejectReason::Expired));
                }
            } else {
                tracing::debug!(user_id = %user_id, "Session refreshed");
            }
        }

        Ok(user_id)
    }

    /// Revoke one session.
    pub async fn sign_out(&self, session_token: &str) -> AuthResult<()> {
        let rows = SessionRepo::expire(&self.pool, session_token, Utc::now())
            .await
            .map_err(|e| AuthError::storage("expire session", e))?;
        expect_single_row("expire session", rows)?;

        tracing::info!("Session signed out");
        Ok(())
    }

    /// Revoke every live session of a user. Returns how many were revoked.
    ///
    /// With `expect_live` set, revoking nothing is an invariant violation: the
    /// caller's own session should have been among them.
    pub async fn sign_out_all(&self, user_id: DbId, expect_live: bool) -> AuthResult<u64> {
        let rows = SessionRepo::expire_all_for_user(&self.pool, user_id, Utc::now())
            .await
            .map_err(|e| AuthError::storage("expire user sessions", e))?;
        if rows == 0 && expect_live {
            return Err(AuthError::Internal(
                "expire user sessions: no live session matched".to_string(),
            ));
        }

        tracing::info!(user_id = %user_id, revoked = rows, "All sessions signed out");
        Ok(rows)
    }

    /// Look up the CSRF token of a session. No liveness check, no refresh.
    pub async fn csrf_token(&self, session_token: &str) -> AuthResult<String> {
        self.find_session(session_token)
            .await?
            .map(|session| session.csrf_token)
            .ok_or(AuthError::NotFound("session"))
    }

    // ---- helpers ----

    /// Check a handle/password pair and upgrade the stored hash when needed.
    async fn authenticate(
        &self,
        operation: &'static str,
        handle: &str,
        password: &str,
    ) -> AuthResult<User> {
        let user = self.find_user_by_handle(handle).await?;

        let hash = user
            .as_ref()
            .map_or(self.dummy_hash.as_str(), |u| u.password_hash.as_str());
        let verified = self.verify_password(password, hash).await?;

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(reject(operation, RejectReason::BadCredentials)),
        };

        self.rehash_if_needed(&user, password).await?;
        Ok(user)
    }

    async fn rehash_if_needed(&self, user: &User, password: &str) -> AuthResult<()> {
        let needs_rehash = self
            .hasher
            .needs_rehash(&user.password_hash)
            .map_err(|e| AuthError::Internal(format!("Failed to parse stored hash: {e}")))?;
        if !needs_rehash {
            return Ok(());
        }

        match (self.store_rehash(user, password).await, self.config.rehash_policy) {
            (Ok(()), _) => {
                tracing::info!(
                    user_id = %user.id,
                    cost = self.hasher.cost(),
                    "Password hash upgraded"
                );
                Ok(())
            }
            (Err(e), RehashPolicy::FailClosed) => Err(e),
            (Err(e), RehashPolicy::LogAndContinue) => {
                tracing::warn!(user_id = %user.id, error = %e, "Password rehash failed, continuing");
                Ok(())
            }
        }
    }

    async fn store_rehash(&self, user: &User, password: &str) -> AuthResult<()> {
        let password_hash = self.hash_password(password).await?;
        let rows = UserRepo::update_password_hash(&self.pool, user.id, &password_hash, Utc::now())
            .await
            .map_err(|e| AuthError::storage("rehash password", e))?;
        expect_single_row("rehash password", rows)
    }

    async fn create_session(
        &self,
        owner: SessionOwner,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> AuthResult<IssuedSession> {
        let input = CreateSession {
            id: new_id(),
            owner,
            token: self.session_tokens.generate(),
            csrf_token: self.csrf_tokens.generate(),
            expires_at,
            now,
        };
        let session = SessionRepo::create(&self.pool, &input)
            .await
            .map_err(|e| AuthError::storage("create session", e))?;
        Ok(issued(session))
    }

    async fn find_session(&self, token: &str) -> AuthResult<Option<Session>> {
        let mut sessions = SessionRepo::find_by_token(&self.pool, token)
            .await
            .map_err(|e| AuthError::storage("find session", e))?;
        match sessions.len() {
            0 | 1 => Ok(sessions.pop()),
            n => Err(AuthError::Internal(format!(
                "find session: {n} sessions share one token"
            ))),
        }
    }

    async fn find_user_by_handle(&self, handle: &str) -> AuthResult<Option<User>> {
        let mut users = UserRepo::find_by_handle(&self.pool, handle)
            .await
            .map_err(|e| AuthError::storage("find user by handle", e))?;
        match users.len() {
            0 | 1 => Ok(users.pop()),
            n => Err(AuthError::Internal(format!(
                "find user by handle: {n} users share one handle"
            ))),
        }
    }

    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
    }

    async fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))?
            .map_err(|e| AuthError::Internal(format!("Failed to verify password: {e}")))
    }
}

fn issued(session: Session) -> IssuedSession {
    IssuedSession {
        token: session.token,
        csrf_token: session.csrf_token,
        expires_at: session.expires_at,
    }
}

fn expect_single_row(operation: &str, rows: u64) -> AuthResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(AuthError::Internal(format!(
            "{operation}: expected 1 row affected, got {rows}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn refresh_only_below_threshold() {
        let threshold = Duration::minutes(60);
        assert!(should_refresh(Duration::minutes(59), threshold));
        assert!(!should_refresh(Duration::minutes(60), threshold));
        assert!(!should_refresh(Duration::days(7), threshold));
    }

    #[test]
    fn csrf_absent_or_empty_is_not_compared() {
        assert!(csrf_matches(None, "stored"));
        assert!(csrf_matches(Some(""), "stored"));
    }

    #[test]
    fn csrf_supplied_must_match_exactly() {
        assert!(csrf_matches(Some("stored"), "stored"));
        assert!(!csrf_matches(Some("Stored"), "stored"));
        assert!(!csrf_matches(Some("stored "), "stored"));
    }

    #[test]
    fn single_row_expectation() {
        assert!(expect_single_row("op", 1).is_ok());
        assert!(matches!(expect_single_row("op", 0), Err(AuthError::Internal(_))));
        assert!(matches!(expect_single_row("op", 2), Err(AuthError::Internal(_))));
    }
}
