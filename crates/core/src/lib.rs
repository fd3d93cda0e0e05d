//! Dependency-light domain primitives shared by the storage and HTTP layers.

pub mod credentials;
pub mod error;
pub mod token;
pub mod types;
