#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderValue, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use tally_api::auth::config::AuthConfig;
use tally_api::auth::service::AuthService;
use tally_api::config::ServerConfig;
use tally_api::router::build_app_router;
use tally_api::state::AppState;

pub const COOKIE_NAME: &str = "tally_session_token";
pub const PASSWORD: &str = "s3cret!pass";

/// Auth settings with a cheap hash so tests stay fast.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        password_hash_cost: 1,
        password_hash_memory_kib: 64,
        ..AuthConfig::default()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout_secs: 30,
        session_cleanup_interval_secs: 0,
        auth: test_auth_config(),
    }
}

pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config())
}

/// Build the full application router (same middleware stack as `main.rs`).
pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> Router {
    let auth = AuthService::new(pool.clone(), config.auth.clone()).expect("auth service");
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        auth: Arc::new(auth),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Build a request, optionally carrying the session cookie, a CSRF header,
/// and a JSON body.
pub fn request(
    method: Method,
    uri: &str,
    session: Option<&str>,
    csrf: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = session {
        builder = builder.header(COOKIE, format!("{COOKIE_NAME}={token}"));
    }
    if let Some(csrf) = csrf {
        builder = builder.header("x-csrf-token", csrf);
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None, None, None)).await
}

pub async fn post_json(app: &Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(app, request(Method::POST, uri, None, None, Some(json))).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// The raw `Set-Cookie` header of a response.
pub fn set_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

/// The session token carried by a response's `Set-Cookie` header.
pub fn session_token(response: &Response<Body>) -> Option<String> {
    let header = set_cookie_header(response)?;
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    (name == COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
}

// ---------------------------------------------------------------------------
// Flow helpers
// ---------------------------------------------------------------------------

/// Session token and CSRF token of an issued session.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub token: String,
    pub csrf: String,
}

pub async fn sign_up(app: &Router, handle: &str) {
    let response = post_json(
        app,
        "/api/v1/auth/sign-up",
        serde_json::json!({ "handle": handle, "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

pub async fn pre_session(app: &Router) -> TestSession {
    let response = send(
        app,
        request(Method::POST, "/api/v1/auth/pre-session", None, None, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = session_token(&response).expect("pre-session cookie");
    let json = body_json(response).await;
    TestSession {
        token,
        csrf: json["data"]["csrfToken"].as_str().unwrap().to_string(),
    }
}

/// POST /auth/sign-in with the given pre-session.
pub async fn sign_in_with(
    app: &Router,
    pre: &TestSession,
    handle: &str,
    password: &str,
) -> Response<Body> {
    send(
        app,
        request(
            Method::POST,
            "/api/v1/auth/sign-in",
            Some(&pre.token),
            Some(&pre.csrf),
            Some(serde_json::json!({ "handle": handle, "password": password })),
        ),
    )
    .await
}

/// Issue a pre-session and sign in with it, returning the active session.
pub async fn sign_in(app: &Router, handle: &str) -> TestSession {
    let pre = pre_session(app).await;
    let response = sign_in_with(app, &pre, handle, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = session_token(&response).expect("session cookie");
    let json = body_json(response).await;
    TestSession {
        token,
        csrf: json["data"]["csrfToken"].as_str().unwrap().to_string(),
    }
}

/// Sign up and sign in a fresh user.
pub async fn signed_in_user(app: &Router, handle: &str) -> TestSession {
    sign_up(app, handle).await;
    sign_in(app, handle).await
}
