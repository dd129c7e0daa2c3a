//! Session token generation.
//!
//! Tokens only need to be unpredictable. Resisting replay of a stolen
//! token, or online guessing beyond what 128 bits of randomness already
//! gives, is out of scope for this layer.

use rand::{RngCore, TryRngCore};

use crate::SessionError;

/// Smallest token size, in bytes, that will be generated.
pub const MIN_TOKEN_BYTES: usize = 8;

/// Entropy source for session tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenEntropy {
    /// `rand`'s thread-local CSPRNG, seeded from the OS and periodically
    /// reseeded. Fast, and the default.
    #[default]
    ThreadRng,
    /// Read every token directly from the operating system.
    OsRng,
}

/// Generates a hex-encoded token of `len` random bytes (at least
/// [`MIN_TOKEN_BYTES`]).
///
/// # Errors
/// Returns [`SessionError::Entropy`] if the OS random source fails.
pub fn generate_token(len: usize, entropy: TokenEntropy) -> Result<String, SessionError> {
    let mut bytes = vec![0u8; len.max(MIN_TOKEN_BYTES)];
    match entropy {
        TokenEntropy::ThreadRng => rand::rng().fill_bytes(&mut bytes),
        TokenEntropy::OsRng => rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::Entropy(e.to_string()))?,
    }
    Ok(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_hex_of_requested_length() {
        let token = generate_token(16, TokenEntropy::ThreadRng).unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_length_has_a_floor() {
        let token = generate_token(2, TokenEntropy::ThreadRng).unwrap();
        assert_eq!(token.len(), MIN_TOKEN_BYTES * 2);
    }

    #[test]
    fn test_os_rng_tokens_differ() {
        let a = generate_token(32, TokenEntropy::OsRng).unwrap();
        let b = generate_token(32, TokenEntropy::OsRng).unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
