//! Password digests.
//!
//! Clients never send a password, only its digest, and the store keeps
//! the same digest. Both sides must agree on this function.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `password`, as sent in `LOGIN` frames.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_known_digest() {
        assert_eq!(
            hash_password("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
