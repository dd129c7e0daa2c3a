//! Error types for the session layer.

use parley_store::StoreError;

/// Errors that can occur during authentication and session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown user or wrong password hash. Carries the username.
    #[error("authentication failed for {0}")]
    AuthFailed(String),

    /// Registration of a username that already has a user record.
    #[error("user {0} already exists")]
    UserExists(String),

    /// A username that cannot be addressed on the wire (empty, or
    /// containing `:` or whitespace).
    #[error("invalid username {0:?}")]
    InvalidUsername(String),

    /// The random source failed while minting a token.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// A session record could not be encoded.
    #[error("session record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The key-value store failed or is unreachable.
    #[error(transparent)]
    Store(#[from] StoreError),
}
