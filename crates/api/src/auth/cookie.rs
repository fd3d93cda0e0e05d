//! Session cookie construction and parsing.
//!
//! The cookie carries only the session token. It is issued without `Max-Age`,
//! so it lives for the browser session while `expires_at` on the server stays
//! authoritative. The CSRF token is never placed in a cookie.

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use super::config::CookieConfig;

/// Build the `Set-Cookie` value carrying `token`.
pub fn session_cookie(config: &CookieConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{}={token}; Path=/{}", config.name, attributes(config)))
}

/// Build a `Set-Cookie` value that makes the browser drop the session cookie.
pub fn expired_session_cookie(config: &CookieConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; Max-Age=0{}",
        config.name,
        attributes(config)
    ))
}

fn attributes(config: &CookieConfig) -> String {
    let mut attrs = String::new();
    if config.http_only {
        attrs.push_str("; HttpOnly");
    }
    if config.secure {
        attrs.push_str("; Secure");
    }
    attrs.push_str("; SameSite=");
    attrs.push_str(config.same_site.as_str());
    attrs
}

/// Find the value of cookie `name` in the request's `Cookie` headers.
///
/// Empty values are treated as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::SameSite;

    fn config() -> CookieConfig {
        CookieConfig {
            name: "sid".to_string(),
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
        }
    }

    #[test]
    fn session_cookie_has_no_max_age() {
        let cookie = session_cookie(&config(), "abc123").unwrap();
        assert_eq!(cookie, "sid=abc123; Path=/; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn secure_and_same_site_follow_config() {
        let config = CookieConfig {
            http_only: false,
            secure: true,
            same_site: SameSite::Strict,
            ..config()
        };
        let cookie = session_cookie(&config, "abc123").unwrap();
        assert_eq!(cookie, "sid=abc123; Path=/; Secure; SameSite=Strict");
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_session_cookie(&config()).unwrap();
        assert_eq!(cookie, "sid=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn read_cookie_finds_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sid=tok; other"));
        assert_eq!(read_cookie(&headers, "sid").as_deref(), Some("tok"));
        assert_eq!(read_cookie(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn read_cookie_searches_every_header() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("sid=tok"));
        assert_eq!(read_cookie(&headers, "sid").as_deref(), Some("tok"));
    }

    #[test]
    fn empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid="));
        assert_eq!(read_cookie(&headers, "sid"), None);
    }

    #[test]
    fn empty_value_does_not_shadow_later_one() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sid=; theme=dark; sid=tok"));
        assert_eq!(read_cookie(&headers, "sid").as_deref(), Some("tok"));
    }
}
