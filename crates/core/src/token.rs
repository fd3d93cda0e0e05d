//! Random bearer-token generation for session and CSRF tokens.
//!
//! Tokens are drawn from [`rand::rng`], a CSPRNG seeded from the operating
//! system and periodically reseeded. Characters are sampled uniformly from the
//! configured alphabet (no modulo bias).

use rand::Rng;

use crate::error::CoreError;

/// The default token alphabet: ASCII letters and digits.
pub const ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces unguessable strings of a fixed length over a fixed alphabet.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    length: usize,
    charset: Vec<char>,
}

impl TokenGenerator {
    /// Build a generator, rejecting empty alphabets, duplicate characters,
    /// and zero lengths.
    pub fn new(length: usize, charset: &str) -> Result<Self, CoreError> {
        if length == 0 {
            return Err(CoreError::Validation(
                "Token length must be greater than zero".to_string(),
            ));
        }

        let chars: Vec<char> = charset.chars().collect();
        if chars.is_empty() {
            return Err(CoreError::Validation(
                "Token charset must not be empty".to_string(),
            ));
        }

        let mut sorted = chars.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(CoreError::Validation(
                "Token charset must not contain duplicate characters".to_string(),
            ));
        }

        Ok(Self {
            length,
            charset: chars,
        })
    }

    /// Generate a new token.
    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| self.charset[rng.random_range(0..self.charset.len())])
            .collect()
    }
}
