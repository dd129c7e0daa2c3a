//! Session types: configuration and the record stored per logged-in user.
//!
//! A "session" is the store's proof that a user logged in recently. It
//! holds one opaque token and expires on its own after a TTL. Logging in
//! again overwrites it, which invalidates the previous token.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TokenEntropy;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session stays valid after login.
    ///
    /// Default: 1800 seconds.
    pub ttl: Duration,

    /// Number of random bytes in a session token. The token on the wire is
    /// the hex encoding, so twice as many characters.
    ///
    /// Default: 16 (128 bits). Values below 8 are raised to 8.
    pub token_bytes: usize,

    /// Where token randomness comes from.
    pub entropy: TokenEntropy,

    /// Prepended to the username to form the session key.
    ///
    /// Default: empty, so the session lives at `<username>`.
    pub key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(1800),
            token_bytes: 16,
            entropy: TokenEntropy::default(),
            key_prefix: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// The JSON value stored under a user's session key:
/// `{"session_token": "<hex>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_token: String,
}

// ---------------------------------------------------------------------------
// SessionCheck
// ---------------------------------------------------------------------------

/// Outcome of comparing a presented token with the stored session.
///
/// ```text
///   Absent ──(login)──→ Valid ──(re-login)──→ Mismatch (old token)
///                         │
///                         └──(logout / TTL)──→ Absent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// A session exists and the token matches exactly.
    Valid,
    /// A session exists but holds a different token.
    Mismatch,
    /// No session: never logged in, logged out, or expired.
    Absent,
}

impl SessionCheck {
    /// Returns `true` for [`SessionCheck::Valid`].
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_protocol() {
        let config = SessionConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(1800));
        assert_eq!(config.token_bytes, 16);
        assert!(config.key_prefix.is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let record = SessionRecord {
            session_token: "00ff".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"session_token":"00ff"}"#);

        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
