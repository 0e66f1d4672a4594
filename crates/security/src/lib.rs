//! API-key generation and verification for tenant (site) authentication.
//!
//! No password-hashing crate is pulled in here: the workspace's dependency
//! stack has no argon2/bcrypt/scrypt equivalent, so this hashes API keys
//! with an iterated HMAC-SHA256 construction (PBKDF2-HMAC-SHA256) built
//! directly from `hmac` + `sha2`, and verifies in constant time via
//! `subtle`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const ITERATIONS: u32 = 100_000;
const SALT_BYTES: usize = 16;
const KEY_PREFIX: &str = "ntk";

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("malformed api key hash")]
    MalformedHash,
}

/// Generates a fresh, high-entropy raw API key. Returned to the caller
/// exactly once at site registration; never stored directly.
pub fn generate_api_key() -> String {
    format!("{KEY_PREFIX}_{}", nanoid::nanoid!(32))
}

/// Derives a salted, iterated hash of `raw_key` suitable for storage in
/// `sites.api_key_hash`. Format: `pbkdf2-hmac-sha256$<iterations>$<salt-hex>$<hash-hex>`.
pub fn hash_api_key(raw_key: &str) -> String {
    use rand::Rng;
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill(&mut salt);
    let digest = derive(raw_key, &salt, ITERATIONS);
    format!(
        "pbkdf2-hmac-sha256${}${}${}",
        ITERATIONS,
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Verifies `raw_key` against a stored hash in constant time. Returns
/// `Ok(false)` on a non-matching key, `Err` only if the stored hash itself
/// is malformed (a data-integrity bug, not a client error).
pub fn verify_api_key(raw_key: &str, stored_hash: &str) -> Result<bool, SecurityError> {
    let mut parts = stored_hash.split('$');
    let scheme = parts.next().ok_or(SecurityError::MalformedHash)?;
    if scheme != "pbkdf2-hmac-sha256" {
        return Err(SecurityError::MalformedHash);
    }
    let iterations: u32 = parts
        .next()
        .ok_or(SecurityError::MalformedHash)?
        .parse()
        .map_err(|_| SecurityError::MalformedHash)?;
    let salt = hex::decode(parts.next().ok_or(SecurityError::MalformedHash)?)
        .map_err(|_| SecurityError::MalformedHash)?;
    let expected = hex::decode(parts.next().ok_or(SecurityError::MalformedHash)?)
        .map_err(|_| SecurityError::MalformedHash)?;

    let actual = derive(raw_key, &salt, iterations);
    Ok(actual.ct_eq(&expected).into())
}

fn derive(raw_key: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    // Iterated HMAC keyed by the salt, re-feeding the previous block each
    // round; a minimal PBKDF2-F single-block instantiation.
    let mut block = {
        let mut mac = HmacSha256::new_from_slice(salt).expect("hmac accepts any key length");
        mac.update(raw_key.as_bytes());
        mac.finalize().into_bytes().to_vec()
    };
    for _ in 1..iterations {
        let mut mac = HmacSha256::new_from_slice(salt).expect("hmac accepts any key length");
        mac.update(&block);
        block = mac.finalize().into_bytes().to_vec();
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_succeeds() {
        let key = generate_api_key();
        let hash = hash_api_key(&key);
        assert!(verify_api_key(&key, &hash).unwrap());
    }

    #[test]
    fn mutated_key_fails() {
        let key = generate_api_key();
        let hash = hash_api_key(&key);
        let mut mutated = key.clone();
        mutated.push('x');
        assert!(!verify_api_key(&mutated, &hash).unwrap());
    }

    #[test]
    fn malformed_hash_errors() {
        assert!(verify_api_key("whatever", "not-a-real-hash").is_err());
    }

    #[test]
    fn distinct_keys_hash_distinctly() {
        let a = hash_api_key("same-input");
        let b = hash_api_key("same-input");
        // different random salts -> different stored hashes even for the same raw key
        assert_ne!(a, b);
    }
}
