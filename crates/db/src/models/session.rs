//! Session model.
//!
//! The `sessions.user_id` column is nullable: NULL marks a pre-session. That
//! encoding stays at this boundary. Everything above it sees [`SessionOwner`].

use sqlx::FromRow;
use tally_core::types::{DbId, Timestamp};

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOwner {
    /// A pre-session: issued before sign-in, never grants access.
    Anonymous,
    /// An active session bound to a user.
    Owned(DbId),
}

impl SessionOwner {
    fn from_column(user_id: Option<DbId>) -> Self {
        match user_id {
            Some(id) => Self::Owned(id),
            None => Self::Anonymous,
        }
    }

    pub(crate) fn to_column(self) -> Option<DbId> {
        match self {
            Self::Owned(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

/// Raw row from the `sessions` table.
#[derive(FromRow)]
pub(crate) struct SessionRow {
    id: DbId,
    user_id: Option<DbId>,
    token: String,
    csrf_token: String,
    expires_at: Timestamp,
    created_at: Timestamp,
    updated_at: Timestamp,
}

/// A pre-session or active session.
#[derive(Clone)]
pub struct Session {
    pub id: DbId,
    pub owner: SessionOwner,
    pub token: String,
    pub csrf_token: String,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Session {
    /// The one liveness rule: a session is live iff it expires strictly after `now`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }

    /// Time left before expiry; negative once the session is dead.
    pub fn remaining(&self, now: Timestamp) -> chrono::Duration {
        self.expires_at - now
    }
}

// Tokens are bearer credentials; keep them out of debug output.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            owner: SessionOwner::from_column(row.user_id),
            token: row.token,
            csrf_token: row.csrf_token,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for creating a new session.
pub struct CreateSession {
    pub id: DbId,
    pub owner: SessionOwner,
    pub token: String,
    pub csrf_token: String,
    pub expires_at: Timestamp,
    pub now: Timestamp,
}

/// DTO for the owned session minted by a pre-session promotion.
///
/// Timestamps are assigned inside the promotion transaction.
pub struct PromoteSession {
    pub id: DbId,
    pub user_id: DbId,
    pub token: String,
    pub csrf_token: String,
    pub lifetime: chrono::Duration,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn session_expiring_at(expires_at: Timestamp) -> Session {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Session {
            id: tally_core::types::new_id(),
            owner: SessionOwner::Anonymous,
            token: "token".into(),
            csrf_token: "csrf".into(),
            expires_at,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn live_strictly_before_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert!(session_expiring_at(now + Duration::seconds(1)).is_live(now));
        assert!(!session_expiring_at(now).is_live(now), "expiring exactly now is dead");
        assert!(!session_expiring_at(now - Duration::minutes(5)).is_live(now));
    }

    #[test]
    fn remaining_goes_negative_after_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let session = session_expiring_at(now - Duration::minutes(5));
        assert_eq!(session.remaining(now), Duration::minutes(-5));
    }

    #[test]
    fn owner_round_trips_through_column() {
        let id = tally_core::types::new_id();
        assert_eq!(SessionOwner::from_column(None), SessionOwner::Anonymous);
        assert_eq!(SessionOwner::from_column(Some(id)), SessionOwner::Owned(id));
        assert_eq!(SessionOwner::Owned(id).to_column(), Some(id));
        assert_eq!(SessionOwner::Anonymous.to_column(), None);
    }

    #[test]
    fn debug_output_omits_tokens() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let rendered = format!("{:?}", session_expiring_at(now));
        assert!(!rendered.contains("csrf"));
        assert!(!rendered.contains("\"token\""));
    }
}
