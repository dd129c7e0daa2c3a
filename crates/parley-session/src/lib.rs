//! Authentication and session management for Parley.
//!
//! This crate decides who a connection is:
//!
//! 1. **Credentials**: `LOGIN` carries a SHA-256 password digest, checked
//!    against the user record ([`hash_password`] computes the same digest)
//! 2. **Sessions**: a successful login stores a random token with a TTL
//!    ([`SessionAuthenticator::login`]); every `MESSAGE` presents it again
//! 3. **Teardown**: logout, disconnect and expiry remove the session, the
//!    active-user entry and the presence entry together
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)  ← calls login / check / logout per request
//!     ↕
//! Session Layer (this crate)  ← owns user:*, session and active_users keys
//!     ↕
//! Store + Presence (below)  ← KeyValueStore, PresenceRegistry
//! ```

mod auth;
mod error;
mod password;
mod session;
mod token;

pub use auth::{ACTIVE_USERS_KEY, PASSWORD_FIELD, SessionAuthenticator, user_key};
pub use error::SessionError;
pub use password::hash_password;
pub use session::{SessionCheck, SessionConfig, SessionRecord};
pub use token::{MIN_TOKEN_BYTES, TokenEntropy, generate_token};
