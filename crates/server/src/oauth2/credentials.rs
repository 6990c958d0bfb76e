//! API key generation and hashing.
//!
//! Keys look like `agw_<prefix>_<secret>`. The prefix is stored in clear for
//! lookup; the full key is stored only as an Argon2id hash with a per-key salt
//! and the server-wide pepper as the Argon2 secret.

use crate::security::generate_token;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use std::fmt;

pub const API_KEY_SCHEME: &str = "agw";
const PREFIX_BYTES: usize = 4;
const SALT_BYTES: usize = 16;

/// A freshly generated key. The plaintext exists only until it is handed to the user.
pub struct GeneratedKey {
    pub plaintext: String,
    pub prefix: String,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("prefix", &self.prefix)
            .field("plaintext", &"<redacted>")
            .finish()
    }
}

pub fn generate_api_key() -> Result<GeneratedKey, getrandom::Error> {
    let mut prefix_bytes = [0u8; PREFIX_BYTES];
    getrandom::fill(&mut prefix_bytes)?;
    let prefix: String = prefix_bytes.iter().map(|b| format!("{b:02x}")).collect();
    let secret = generate_token()?;
    Ok(GeneratedKey {
        plaintext: format!("{API_KEY_SCHEME}_{prefix}_{secret}"),
        prefix,
    })
}

/// Split a presented key into its lookup prefix and secret part.
pub fn parse_api_key(presented: &str) -> Option<(&str, &str)> {
    let rest = presented.strip_prefix(API_KEY_SCHEME)?.strip_prefix('_')?;
    let (prefix, secret) = rest.split_once('_')?;
    let prefix_ok =
        prefix.len() == PREFIX_BYTES * 2 && prefix.bytes().all(|b| b.is_ascii_hexdigit());
    if !prefix_ok || secret.is_empty() {
        return None;
    }
    Some((prefix, secret))
}

/// Argon2id hasher bound to the server pepper.
#[derive(Clone)]
pub struct KeyHasher {
    pepper: Vec<u8>,
}

impl fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHasher").finish_non_exhaustive()
    }
}

impl KeyHasher {
    pub fn new(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    fn argon2(&self) -> Result<Argon2<'_>, argon2::Error> {
        Argon2::new_with_secret(
            &self.pepper,
            Algorithm::Argon2id,
            Version::V0x13,
            Params::default(),
        )
    }

    /// Hash a key. Returns the PHC string suitable for storage.
    pub fn hash(&self, key: &str) -> Result<String, String> {
        let mut salt_bytes = [0u8; SALT_BYTES];
        getrandom::fill(&mut salt_bytes).map_err(|e| e.to_string())?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| e.to_string())?;
        let argon2 = self.argon2().map_err(|e| e.to_string())?;
        argon2
            .hash_password(key.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| e.to_string())
    }

    /// Verify a presented key against a stored hash. Malformed hashes never match.
    pub fn verify(&self, key: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        let Ok(argon2) = self.argon2() else {
            return false;
        };
        argon2.verify_password(key.as_bytes(), &parsed).is_ok()
    }
}
