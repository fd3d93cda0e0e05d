use std::fmt::Display;
use std::str::FromStr;

use axum::http::HeaderValue;

use crate::auth::config::AuthConfig;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: String },

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read {key} from {path}: {source}")]
    File {
        key: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read a variable from the process environment.
///
/// When `<KEY>_FILE` is set, the value is read from that file instead (trailing
/// newlines stripped), so secrets can be mounted rather than exported.
pub fn read_env(key: &str) -> Result<Option<String>, ConfigError> {
    let file_key = format!("{key}_FILE");
    if let Ok(path) = std::env::var(&file_key) {
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::File {
            key: file_key,
            path,
            source,
        })?;
        return Ok(Some(contents.trim_end_matches(['\r', '\n']).to_string()));
    }
    Ok(std::env::var(key).ok())
}

/// Typed access to a key/value source with defaults.
pub struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Result<Option<String>, ConfigError>,
}

impl<'a> Vars<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Result<Option<String>, ConfigError>) -> Self {
        Self { lookup }
    }

    pub fn string(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok((self.lookup)(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn required(&self, key: &str) -> Result<String, ConfigError> {
        match (self.lookup)(key)? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ConfigError::Missing {
                key: key.to_string(),
            }),
        }
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match (self.lookup)(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match (self.lookup)(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw,
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have sensible defaults suitable for
/// local development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Postgres connection URL.
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How often expired sessions are swept, in seconds. `0` disables the sweep.
    pub session_cleanup_interval_secs: u64,
    /// Session, cookie, token, and password-hash settings.
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment (see [`read_env`]).
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `DATABASE_URL`                  | **required**            |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `SESSION_CLEANUP_INTERVAL_SECS` | `3600`                  |
    ///
    /// Auth variables are listed on [`AuthConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&Vars::new(&read_env))
    }

    pub fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let cors_origins = vars
            .string("CORS_ORIGINS", "http://localhost:5173")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|origin| {
                origin.parse().map_err(|e| ConfigError::Invalid {
                    key: "CORS_ORIGINS".to_string(),
                    value: origin.to_string(),
                    reason: format!("{e}"),
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            host: vars.string("HOST", "0.0.0.0")?,
            port: vars.parse("PORT", 3000)?,
            database_url: vars.required("DATABASE_URL")?,
            cors_origins,
            request_timeout_secs: vars.parse("REQUEST_TIMEOUT_SECS", 30)?,
            session_cleanup_interval_secs: vars.parse("SESSION_CLEANUP_INTERVAL_SECS", 3600)?,
            auth: AuthConfig::from_vars(vars)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let lookup = move |key: &str| -> Result<Option<String>, ConfigError> {
            Ok(map.get(key).cloned())
        };
        ServerConfig::from_vars(&Vars::new(&lookup))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/tally")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(
            config.cors_origins,
            vec![HeaderValue::from_static("http://localhost:5173")]
        );
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.session_cleanup_interval_secs, 3600);
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(ConfigError::Missing { key }) if key == "DATABASE_URL");
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/tally"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,,"),
        ])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec![
                HeaderValue::from_static("https://a.example"),
                HeaderValue::from_static("https://b.example"),
            ]
        );
    }

    #[test]
    fn unparsable_cors_origin_is_fatal() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/tally"),
            ("CORS_ORIGINS", "https://a.example,https://b.example\u{1}"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn invalid_port_names_the_variable() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/tally"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn bool_accepts_common_spellings() {
        let map: HashMap<&str, &str> = [("A", "TRUE"), ("B", "0"), ("C", "maybe")].into();
        let lookup = move |key: &str| -> Result<Option<String>, ConfigError> {
            Ok(map.get(key).map(|v| v.to_string()))
        };
        let vars = Vars::new(&lookup);
        assert!(vars.bool("A", false).unwrap());
        assert!(!vars.bool("B", true).unwrap());
        assert!(vars.bool("C", true).is_err());
        assert!(vars.bool("MISSING", true).unwrap());
    }
}
