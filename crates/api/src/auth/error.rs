use tally_core::error::CoreError;

/// Why a credential or session check was rejected.
///
/// Only ever logged. Every reason renders to the client as the same
/// "unauthorized" response so a caller cannot tell which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The request carried no session cookie.
    MissingCookie,
    /// A state-changing request without an `X-CSRF-Token` header.
    MissingCsrfHeader,
    /// No session row carries the presented token.
    UnknownToken,
    /// A pre-session token that was already bound to a user.
    AlreadyPromoted,
    /// A pre-session token presented where an active session is required.
    PreSession,
    CsrfMismatch,
    Expired,
    /// Unknown handle or wrong password.
    BadCredentials,
    /// The pre-session was consumed by a concurrent sign-in.
    PromotionRaced,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCookie => "missing_cookie",
            Self::MissingCsrfHeader => "missing_csrf_header",
            Self::UnknownToken => "not_found",
            Self::AlreadyPromoted => "already_promoted",
            Self::PreSession => "pre_session",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::Expired => "expired",
            Self::BadCredentials => "bad_credentials",
            Self::PromotionRaced => "promotion_raced",
        }
    }
}

/// Errors returned by [`AuthService`](super::service::AuthService).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized(RejectReason),

    #[error("handle already taken")]
    Conflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage failure, hashing failure, or a broken uniqueness invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn storage(context: &str, err: sqlx::Error) -> Self {
        Self::Internal(format!("{context}: {err}"))
    }
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_display_hides_reason() {
        for reason in [
            RejectReason::UnknownToken,
            RejectReason::CsrfMismatch,
            RejectReason::Expired,
            RejectReason::BadCredentials,
        ] {
            assert_eq!(AuthError::Unauthorized(reason).to_string(), "unauthorized");
        }
    }

    #[test]
    fn core_validation_maps_to_validation() {
        let err: AuthError = CoreError::Validation("bad handle".into()).into();
        assert!(matches!(err, AuthError::Validation(msg) if msg == "bad handle"));
    }
}
