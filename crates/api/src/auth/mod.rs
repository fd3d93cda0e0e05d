//! Session authentication: configuration, password hashing, the auth service,
//! and session cookies.

pub mod config;
pub mod cookie;
pub mod error;
pub mod password;
pub mod service;
