//! Authentication settings, handed to [`AuthService`](super::service::AuthService)
//! at construction.

use std::str::FromStr;

use tally_core::token::{TokenGenerator, ALPHANUMERIC};

use crate::config::{ConfigError, Vars};

/// Upper bound for every lifetime setting: 100 years in minutes. Larger values
/// overflow timestamp arithmetic or land outside the `TIMESTAMPTZ` range.
pub const MAX_LIFETIME_MINS: i64 = 100 * 365 * 24 * 60;

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("expected lax, strict, or none, got {other:?}")),
        }
    }
}

/// What sign-in does when persisting an upgraded password hash fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehashPolicy {
    /// Abort the sign-in with an internal error.
    FailClosed,
    /// Log a warning and finish signing in with the old hash left in place.
    LogAndContinue,
}

impl FromStr for RehashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail_closed" => Ok(Self::FailClosed),
            "log_and_continue" => Ok(Self::LogAndContinue),
            other => Err(format!(
                "expected fail_closed or log_and_continue, got {other:?}"
            )),
        }
    }
}

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

/// Configuration for sessions, tokens, and password hashing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Argon2 iteration count; the work factor compared for opportunistic rehash.
    pub password_hash_cost: u32,
    /// Argon2 memory cost in KiB.
    pub password_hash_memory_kib: u32,
    pub rehash_policy: RehashPolicy,
    pub session_token_length: usize,
    pub session_token_charset: String,
    pub csrf_token_length: usize,
    pub csrf_token_charset: String,
    pub session_lifetime_mins: i64,
    pub pre_session_lifetime_mins: i64,
    /// Sessions are only extended once fewer than this many minutes remain.
    pub session_refresh_threshold_mins: i64,
    pub cookie: CookieConfig,
    /// Enables single-step sign-in without a pre-session.
    pub legacy_sign_in_enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: 3,
            password_hash_memory_kib: 19 * 1024,
            rehash_policy: RehashPolicy::FailClosed,
            session_token_length: 32,
            session_token_charset: ALPHANUMERIC.to_string(),
            csrf_token_length: 32,
            csrf_token_charset: ALPHANUMERIC.to_string(),
            session_lifetime_mins: 60 * 24 * 7,
            pre_session_lifetime_mins: 15,
            session_refresh_threshold_mins: 60,
            cookie: CookieConfig {
                name: "tally_session_token".to_string(),
                http_only: true,
                secure: false,
                same_site: SameSite::Lax,
            },
            legacy_sign_in_enabled: false,
        }
    }
}

impl AuthConfig {
    /// Load from environment-style variables, falling back to [`AuthConfig::default`].
    ///
    /// | Env Var                         | Default               |
    /// |---------------------------------|-----------------------|
    /// | `PASSWORD_HASH_COST`            | `3`                   |
    /// | `PASSWORD_HASH_MEMORY_KIB`      | `19456`               |
    /// | `PASSWORD_REHASH_POLICY`        | `fail_closed`         |
    /// | `SESSION_TOKEN_LENGTH`          | `32`                  |
    /// | `SESSION_TOKEN_CHARSET`         | `[a-zA-Z0-9]`         |
    /// | `CSRF_TOKEN_LENGTH`             | `32`                  |
    /// | `CSRF_TOKEN_CHARSET`            | `[a-zA-Z0-9]`         |
    /// | `SESSION_LIFETIME_MIN`          | `10080`               |
    /// | `PRE_SESSION_LIFETIME_MIN`      | `15`                  |
    /// | `SESSION_REFRESH_THRESHOLD_MIN` | `60`                  |
    /// | `SESSION_COOKIE_NAME`           | `tally_session_token` |
    /// | `SESSION_COOKIE_HTTP_ONLY`      | `true`                |
    /// | `SESSION_COOKIE_SECURE`         | `false`               |
    /// | `SESSION_COOKIE_SAME_SITE`      | `lax`                 |
    /// | `LEGACY_SIGN_IN_ENABLED`        | `false`               |
    pub fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            password_hash_cost: vars.parse("PASSWORD_HASH_COST", defaults.password_hash_cost)?,
            password_hash_memory_kib: vars
                .parse("PASSWORD_HASH_MEMORY_KIB", defaults.password_hash_memory_kib)?,
            rehash_policy: vars.parse("PASSWORD_REHASH_POLICY", defaults.rehash_policy)?,
            session_token_length: vars
                .parse("SESSION_TOKEN_LENGTH", defaults.session_token_length)?,
            session_token_charset: vars
                .string("SESSION_TOKEN_CHARSET", &defaults.session_token_charset)?,
            csrf_token_length: vars.parse("CSRF_TOKEN_LENGTH", defaults.csrf_token_length)?,
            csrf_token_charset: vars.string("CSRF_TOKEN_CHARSET", &defaults.csrf_token_charset)?,
            session_lifetime_mins: vars
                .parse("SESSION_LIFETIME_MIN", defaults.session_lifetime_mins)?,
            pre_session_lifetime_mins: vars
                .parse("PRE_SESSION_LIFETIME_MIN", defaults.pre_session_lifetime_mins)?,
            session_refresh_threshold_mins: vars.parse(
                "SESSION_REFRESH_THRESHOLD_MIN",
                defaults.session_refresh_threshold_mins,
            )?,
            cookie: CookieConfig {
                name: vars.string("SESSION_COOKIE_NAME", &defaults.cookie.name)?,
                http_only: vars.bool("SESSION_COOKIE_HTTP_ONLY", defaults.cookie.http_only)?,
                secure: vars.bool("SESSION_COOKIE_SECURE", defaults.cookie.secure)?,
                same_site: vars.parse("SESSION_COOKIE_SAME_SITE", defaults.cookie.same_site)?,
            },
            legacy_sign_in_enabled: vars
                .bool("LEGACY_SIGN_IN_ENABLED", defaults.legacy_sign_in_enabled)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that individual parsing cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String, reason: &str| ConfigError::Invalid {
            key: key.to_string(),
            value,
            reason: reason.to_string(),
        };

        for (key, mins) in [
            ("SESSION_LIFETIME_MIN", self.session_lifetime_mins),
            ("PRE_SESSION_LIFETIME_MIN", self.pre_session_lifetime_mins),
        ] {
            if mins <= 0 || mins > MAX_LIFETIME_MINS {
                return Err(invalid(
                    key,
                    mins.to_string(),
                    &format!("must be between 1 and {MAX_LIFETIME_MINS}"),
                ));
            }
        }
        if self.session_refresh_threshold_mins < 0
            || self.session_refresh_threshold_mins > self.session_lifetime_mins
        {
            return Err(invalid(
                "SESSION_REFRESH_THRESHOLD_MIN",
                self.session_refresh_threshold_mins.to_string(),
                "must be between 0 and SESSION_LIFETIME_MIN",
            ));
        }
        for (key, length, charset) in [
            ("SESSION_TOKEN", self.session_token_length, &self.session_token_charset),
            ("CSRF_TOKEN", self.csrf_token_length, &self.csrf_token_charset),
        ] {
            TokenGenerator::new(length, charset).map_err(|e| {
                invalid(&format!("{key}_CHARSET"), charset.clone(), &e.to_string())
            })?;
        }
        if self.cookie.name.is_empty() {
            return Err(invalid(
                "SESSION_COOKIE_NAME",
                String::new(),
                "must not be empty",
            ));
        }
        if self.cookie.same_site == SameSite::None && !self.cookie.secure {
            return Err(invalid(
                "SESSION_COOKIE_SAME_SITE",
                "none".to_string(),
                "SameSite=None requires SESSION_COOKIE_SECURE=true",
            ));
        }
        Ok(())
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_lifetime_mins)
    }

    pub fn pre_session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pre_session_lifetime_mins)
    }

    pub fn session_refresh_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_refresh_threshold_mins)
    }
}
