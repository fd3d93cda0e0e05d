//! Argon2id password hashing, verification, and work-factor inspection.
//!
//! All password hashes use the Argon2id variant with a 16-byte salt drawn from
//! [`rand::rng`]. The PHC string format is used for storage so
//! that algorithm parameters and salt are embedded in the hash itself, which is
//! what lets sign-in notice a hash created at an older cost.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

/// Hashes and verifies passwords at a fixed Argon2id configuration.
///
/// The iteration count (`t_cost`) is the work factor: [`needs_rehash`](Self::needs_rehash)
/// compares it against the one embedded in a stored hash.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Build a hasher with `cost` iterations and `memory_kib` KiB of memory.
    pub fn new(cost: u32, memory_kib: u32) -> Result<Self, argon2::Error> {
        let params = Params::new(memory_kib, cost, Params::DEFAULT_P_COST, None)?;
        Ok(Self { params })
    }

    /// The configured work factor.
    pub fn cost(&self) -> u32 {
        self.params.t_cost()
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a random salt.
    ///
    /// Returns the PHC-formatted hash string (includes algorithm, params, salt, and hash).
    pub fn hash(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)?;
        let hash = self.argon2().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC-formatted hash.
    ///
    /// The parameters embedded in `hash` are used, not the configured ones, so
    /// hashes created at an older cost keep verifying.
    ///
    /// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether `hash` was produced below the configured work factor.
    pub fn needs_rehash(&self, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        Ok(hash_cost(hash)? < self.cost())
    }
}

/// Extract the work factor (Argon2 `t_cost`) embedded in a PHC hash string.
pub fn hash_cost(hash: &str) -> Result<u32, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let params = Params::try_from(&parsed_hash)?;
    Ok(params.t_cost())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small memory keeps the tests fast; the cost is what is under test.
    fn hasher(cost: u32) -> PasswordHasher {
        PasswordHasher::new(cost, 64).expect("valid params")
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher(1);
        let hash = hasher.hash("correct-horse").expect("hashing should succeed");

        assert!(
            hash.starts_with("$argon2id$"),
            "expected argon2id PHC prefix"
        );
        assert!(hasher.verify("correct-horse", &hash).expect("verify should succeed"));
    }

    #[test]
    fn test_wrong_password_fails() {
        let hasher = hasher(1);
        let hash = hasher.hash("real-password").expect("hashing should succeed");
        let verified = hasher.verify("wrong-password", &hash).expect("verify should succeed");
        assert!(!verified, "wrong password should verify as false");
    }

    #[test]
    fn test_cost_is_embedded_in_hash() {
        let hash = hasher(2).hash("password1").unwrap();
        assert_eq!(hash_cost(&hash).unwrap(), 2);
    }

    #[test]
    fn test_needs_rehash_only_below_configured_cost() {
        let weak = hasher(1).hash("password1").unwrap();
        let strong = hasher(3).hash("password1").unwrap();

        let current = hasher(2);
        assert!(current.needs_rehash(&weak).unwrap());
        assert!(!current.needs_rehash(&strong).unwrap());
        assert!(!current.needs_rehash(&hasher(2).hash("password1").unwrap()).unwrap());
    }

    #[test]
    fn test_hash_from_older_cost_still_verifies() {
        let old = hasher(1).hash("password1").unwrap();
        assert!(hasher(3).verify("password1", &old).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(hasher(1).verify("password1", "not-a-phc-string").is_err());
        assert!(hash_cost("not-a-phc-string").is_err());
    }

    #[test]
    fn test_zero_cost_is_rejected() {
        assert!(PasswordHasher::new(0, 64).is_err());
    }
}
