//! Low-level security primitives shared by the boundary components.

use base64::Engine;
use serde_json::Value;
use subtle::ConstantTimeEq;

/// Number of random bytes behind every state, verifier and key secret.
pub const TOKEN_BYTES: usize = 32;

/// Compare two strings without leaking the position of the first mismatch.
///
/// Inputs of different length compare unequal; only the lengths are observable.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Generate a 256-bit random token, URL-safe base64 without padding.
pub fn generate_token() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// JSON parser with limits on input size and nesting depth.
///
/// Used for bodies this service does not control: provider responses and
/// stored payload blobs.
pub struct SecureJsonParser {
    max_size: usize,
    max_depth: usize,
}

impl Default for SecureJsonParser {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024,
            max_depth: 32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonSecurityError {
    #[error("JSON too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
    #[error("JSON too deep (max: {max})")]
    TooDeep { max: usize },
    #[error("JSON parsing error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl SecureJsonParser {
    pub fn new(max_size: usize, max_depth: usize) -> Self {
        Self {
            max_size,
            max_depth,
        }
    }

    pub fn parse_from_slice(&self, data: &[u8]) -> Result<Value, JsonSecurityError> {
        if data.len() > self.max_size {
            return Err(JsonSecurityError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }
        let value: Value = serde_json::from_slice(data)?;
        if depth_of(&value) > self.max_depth {
            return Err(JsonSecurityError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(value)
    }
}

fn depth_of(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth_of).max().unwrap_or(0),
        _ => 0,
    }
}

/// Parse with the default limits.
pub fn secure_parse_json_slice(data: &[u8]) -> Result<Value, JsonSecurityError> {
    SecureJsonParser::default().parse_from_slice(data)
}
