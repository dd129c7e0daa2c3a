//! Credential checks and session lifecycle against the key-value store.
//!
//! [`SessionAuthenticator`] owns every store key Parley touches:
//!
//! ```text
//! user:<name>     hash   { password_hash: <sha256 hex> }
//! <prefix><name>  string {"session_token":"<hex>"}   (TTL)
//! active_users    set    usernames with a session
//! ```
//!
//! It also holds the [`PresenceRegistry`] so that logout, disconnect and
//! expiry drop the routing entry together with the stored session.

use std::sync::Arc;

use parley_presence::PresenceRegistry;
use parley_store::KeyValueStore;
use parley_transport::ConnectionId;

use crate::session::{SessionCheck, SessionConfig, SessionRecord};
use crate::token::generate_token;
use crate::{SessionError, hash_password};

/// Key of the set holding every username with a session.
pub const ACTIVE_USERS_KEY: &str = "active_users";

/// Hash field holding a user's password digest.
pub const PASSWORD_FIELD: &str = "password_hash";

/// Store key of a user's credential hash.
pub fn user_key(username: &str) -> String {
    format!("user:{username}")
}

/// Authenticates users and manages their sessions.
///
/// Generic over the store so tests run against
/// [`MemoryStore`](parley_store::MemoryStore) and production against Redis.
pub struct SessionAuthenticator<S> {
    store: S,
    presence: Arc<PresenceRegistry>,
    config: SessionConfig,
}

impl<S: KeyValueStore> SessionAuthenticator<S> {
    pub fn new(store: S, presence: Arc<PresenceRegistry>, config: SessionConfig) -> Self {
        Self {
            store,
            presence,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(&self, username: &str) -> String {
        format!("{}{username}", self.config.key_prefix)
    }

    /// Verifies `password_hash` against the user record and opens a session.
    ///
    /// Any previous session for the user is overwritten, so its token stops
    /// validating. Presence is not touched; the caller registers the
    /// connection after this returns.
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`] for an unknown user or wrong hash. The
    ///   store is not modified in that case.
    /// - [`SessionError::Store`] if the store fails.
    pub async fn login(&self, username: &str, password_hash: &str) -> Result<String, SessionError> {
        let stored = self
            .store
            .hget(&user_key(username), PASSWORD_FIELD)
            .await?;

        if stored.as_deref() != Some(password_hash) {
            tracing::debug!(%username, known = stored.is_some(), "login rejected");
            return Err(SessionError::AuthFailed(username.to_string()));
        }

        let token = generate_token(self.config.token_bytes, self.config.entropy)?;
        let record = serde_json::to_string(&SessionRecord {
            session_token: token.clone(),
        })?;

        self.store
            .set_ex(&self.session_key(username), &record, self.config.ttl)
            .await?;
        self.store.sadd(ACTIVE_USERS_KEY, username).await?;

        tracing::info!(%username, "session started");
        Ok(token)
    }

    /// Compares `token` with the stored session for `username`.
    ///
    /// A record that does not decode is logged and reported as a mismatch,
    /// so only a fresh login recovers it.
    pub async fn check(&self, username: &str, token: &str) -> Result<SessionCheck, SessionError> {
        let Some(raw) = self.store.get(&self.session_key(username)).await? else {
            return Ok(SessionCheck::Absent);
        };

        match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.session_token == token => Ok(SessionCheck::Valid),
            Ok(_) => Ok(SessionCheck::Mismatch),
            Err(e) => {
                tracing::warn!(%username, error = %e, "corrupt session record");
                Ok(SessionCheck::Mismatch)
            }
        }
    }

    /// Returns `true` iff a session exists and holds exactly `token`.
    pub async fn validate(&self, username: &str, token: &str) -> Result<bool, SessionError> {
        Ok(self.check(username, token).await?.is_valid())
    }

    /// Ends `username`'s session and drops their presence entry.
    ///
    /// Idempotent. Returns `true` if a stored session existed.
    pub async fn logout(&self, username: &str) -> Result<bool, SessionError> {
        let existed = self.store.del(&self.session_key(username)).await?;
        self.store.srem(ACTIVE_USERS_KEY, username).await?;
        self.presence.unregister(username).await;

        if existed {
            tracing::info!(%username, "session ended");
        }
        Ok(existed)
    }

    /// Logout on behalf of a departing connection.
    ///
    /// Only acts when the presence entry for `username` still belongs to
    /// `conn_id`. A connection whose user has since logged in elsewhere
    /// leaves the newer session alone. Returns `true` if it tore anything
    /// down.
    pub async fn release(&self, username: &str, conn_id: ConnectionId) -> Result<bool, SessionError> {
        if !self.presence.unregister_if(username, conn_id).await {
            tracing::debug!(%username, %conn_id, "release skipped, presence owned elsewhere");
            return Ok(false);
        }

        self.store.del(&self.session_key(username)).await?;
        self.store.srem(ACTIVE_USERS_KEY, username).await?;
        tracing::info!(%username, %conn_id, "session released on disconnect");
        Ok(true)
    }

    /// Members of the active-user set, sorted.
    pub async fn active_users(&self) -> Result<Vec<String>, SessionError> {
        let mut users = self.store.smembers(ACTIVE_USERS_KEY).await?;
        users.sort();
        Ok(users)
    }

    /// Drops presence and active-set entries whose session has expired.
    ///
    /// Active-set members with no presence entry are reaped too, so a
    /// teardown interrupted by a store failure is repaired once the
    /// leftover session expires. Returns the usernames reaped.
    pub async fn reap_expired(&self) -> Result<Vec<String>, SessionError> {
        let mut reaped = Vec::new();

        for (username, conn_id) in self.presence.snapshot().await {
            if self.has_session(&username).await? {
                continue;
            }
            if self.presence.unregister_if(&username, conn_id).await {
                self.store.srem(ACTIVE_USERS_KEY, &username).await?;
                reaped.push(username);
            }
        }

        for username in self.store.smembers(ACTIVE_USERS_KEY).await? {
            if self.presence.contains(&username).await || self.has_session(&username).await? {
                continue;
            }
            if self.store.srem(ACTIVE_USERS_KEY, &username).await? {
                reaped.push(username);
            }
        }

        if !reaped.is_empty() {
            tracing::info!(count = reaped.len(), users = ?reaped, "reaped expired sessions");
        }
        Ok(reaped)
    }

    async fn has_session(&self, username: &str) -> Result<bool, SessionError> {
        Ok(self.store.get(&self.session_key(username)).await?.is_some())
    }

    /// Empties the active-user set. Run at startup, when no connection of
    /// this process can own a session yet.
    pub async fn clear_active_users(&self) -> Result<(), SessionError> {
        if self.store.del(ACTIVE_USERS_KEY).await? {
            tracing::info!("cleared stale active users");
        }
        Ok(())
    }

    /// Creates a user record for `username` with the digest of `password`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`] if the name is empty or contains
    ///   `:` or whitespace, which the wire format cannot carry.
    /// - [`SessionError::UserExists`] if a record already exists.
    pub async fn register_user(&self, username: &str, password: &str) -> Result<(), SessionError> {
        if username.is_empty() || username.contains(':') || username.contains(char::is_whitespace)
        {
            return Err(SessionError::InvalidUsername(username.to_string()));
        }

        let key = user_key(username);
        if self.store.hget(&key, PASSWORD_FIELD).await?.is_some() {
            return Err(SessionError::UserExists(username.to_string()));
        }

        self.store
            .hset(&key, PASSWORD_FIELD, &hash_password(password))
            .await?;
        tracing::info!(%username, "user registered");
        Ok(())
    }

    /// Deletes the user record and logs the user out.
    ///
    /// Returns `true` if a record existed.
    pub async fn remove_user(&self, username: &str) -> Result<bool, SessionError> {
        self.logout(username).await?;
        let existed = self.store.del(&user_key(username)).await?;
        if existed {
            tracing::info!(%username, "user removed");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_presence::Outbound;
    use parley_store::MemoryStore;

    use super::*;

    fn authenticator() -> SessionAuthenticator<MemoryStore> {
        SessionAuthenticator::new(
            MemoryStore::new(),
            Arc::new(PresenceRegistry::new()),
            SessionConfig::default(),
        )
    }

    async fn with_user(name: &str, password: &str) -> SessionAuthenticator<MemoryStore> {
        let auth = authenticator();
        auth.register_user(name, password).await.unwrap();
        auth
    }

    #[tokio::test]
    async fn test_login_success_stores_session_and_active_user() {
        let auth = with_user("alice", "pw").await;

        let token = auth.login("alice", &hash_password("pw")).await.unwrap();

        assert_eq!(token.len(), 32);
        assert!(auth.validate("alice", &token).await.unwrap());
        assert_eq!(auth.active_users().await.unwrap(), vec!["alice"]);

        let raw = auth.store().get("alice").await.unwrap().unwrap();
        assert_eq!(raw, format!(r#"{{"session_token":"{token}"}}"#));
    }

    #[tokio::test]
    async fn test_wrong_password_does_not_touch_store() {
        let auth = with_user("alice", "pw").await;

        let err = auth.login("alice", &hash_password("nope")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthFailed(ref u) if u == "alice"));
        assert_eq!(auth.store().get("alice").await.unwrap(), None);
        assert!(auth.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_fails() {
        let auth = authenticator();
        let err = auth.login("ghost", &hash_password("pw")).await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_relogin_invalidates_previous_token() {
        let auth = with_user("alice", "pw").await;
        let hash = hash_password("pw");

        let first = auth.login("alice", &hash).await.unwrap();
        let second = auth.login("alice", &hash).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(
            auth.check("alice", &first).await.unwrap(),
            SessionCheck::Mismatch
        );
        assert_eq!(
            auth.check("alice", &second).await.unwrap(),
            SessionCheck::Valid
        );
    }

    #[tokio::test]
    async fn test_check_absent_without_session() {
        let auth = with_user("alice", "pw").await;
        assert_eq!(
            auth.check("alice", "whatever").await.unwrap(),
            SessionCheck::Absent
        );
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_mismatch() {
        let auth = with_user("alice", "pw").await;
        auth.store()
            .set_ex("alice", "not json", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            auth.check("alice", "not json").await.unwrap(),
            SessionCheck::Mismatch
        );
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let auth = with_user("alice", "pw").await;
        let token = auth.login("alice", &hash_password("pw")).await.unwrap();
        let (handle, _rx) = Outbound::channel(ConnectionId::new(1), 4);
        auth.presence().register("alice", handle).await;

        assert!(auth.logout("alice").await.unwrap());
        assert!(!auth.logout("alice").await.unwrap());

        assert!(!auth.validate("alice", &token).await.unwrap());
        assert!(auth.active_users().await.unwrap().is_empty());
        assert!(!auth.presence().contains("alice").await);
    }

    #[tokio::test]
    async fn test_release_by_stale_connection_keeps_newer_login() {
        let auth = with_user("alice", "pw").await;
        let hash = hash_password("pw");

        auth.login("alice", &hash).await.unwrap();
        let (old, _old_rx) = Outbound::channel(ConnectionId::new(1), 4);
        auth.presence().register("alice", old).await;

        let token = auth.login("alice", &hash).await.unwrap();
        let (new, _new_rx) = Outbound::channel(ConnectionId::new(2), 4);
        auth.presence().register("alice", new).await;

        assert!(!auth.release("alice", ConnectionId::new(1)).await.unwrap());
        assert!(auth.validate("alice", &token).await.unwrap());
        assert!(auth.presence().contains("alice").await);

        assert!(auth.release("alice", ConnectionId::new(2)).await.unwrap());
        assert!(!auth.validate("alice", &token).await.unwrap());
        assert!(auth.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_users_sorted() {
        let auth = authenticator();
        for name in ["carol", "alice", "bob"] {
            auth.register_user(name, "pw").await.unwrap();
            auth.login(name, &hash_password("pw")).await.unwrap();
        }
        assert_eq!(
            auth.active_users().await.unwrap(),
            vec!["alice", "bob", "carol"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_ttl() {
        let auth = with_user("alice", "pw").await;
        let token = auth.login("alice", &hash_password("pw")).await.unwrap();

        tokio::time::advance(Duration::from_secs(1799)).await;
        assert!(auth.validate("alice", &token).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            auth.check("alice", &token).await.unwrap(),
            SessionCheck::Absent
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_expired_drops_presence_and_active_set() {
        let auth = with_user("alice", "pw").await;
        auth.register_user("bob", "pw").await.unwrap();

        auth.login("alice", &hash_password("pw")).await.unwrap();
        let (a, _a_rx) = Outbound::channel(ConnectionId::new(1), 4);
        auth.presence().register("alice", a).await;

        tokio::time::advance(Duration::from_secs(1000)).await;
        auth.login("bob", &hash_password("pw")).await.unwrap();
        let (b, _b_rx) = Outbound::channel(ConnectionId::new(2), 4);
        auth.presence().register("bob", b).await;

        tokio::time::advance(Duration::from_secs(900)).await;
        let reaped = auth.reap_expired().await.unwrap();

        assert_eq!(reaped, vec!["alice"]);
        assert!(!auth.presence().contains("alice").await);
        assert!(auth.presence().contains("bob").await);
        assert_eq!(auth.active_users().await.unwrap(), vec!["bob"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_expired_drops_orphaned_active_users() {
        let auth = with_user("alice", "pw").await;
        auth.register_user("bob", "pw").await.unwrap();

        // alice: session and active entry but no presence.
        auth.login("alice", &hash_password("pw")).await.unwrap();
        // bob: active entry left behind with no session at all.
        auth.store().sadd(ACTIVE_USERS_KEY, "bob").await.unwrap();

        assert_eq!(auth.reap_expired().await.unwrap(), vec!["bob"]);
        assert_eq!(auth.active_users().await.unwrap(), vec!["alice"]);

        tokio::time::advance(Duration::from_secs(1801)).await;
        assert_eq!(auth.reap_expired().await.unwrap(), vec!["alice"]);
        assert!(auth.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_existing_user_fails() {
        let auth = with_user("alice", "pw").await;
        let err = auth.register_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, SessionError::UserExists(_)));

        // Original password still works.
        auth.login("alice", &hash_password("pw")).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_unaddressable_names() {
        let auth = authenticator();
        for name in ["", "a:b", "two words"] {
            let err = auth.register_user(name, "pw").await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidUsername(_)), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_remove_user_logs_out() {
        let auth = with_user("alice", "pw").await;
        let token = auth.login("alice", &hash_password("pw")).await.unwrap();

        assert!(auth.remove_user("alice").await.unwrap());
        assert!(!auth.validate("alice", &token).await.unwrap());
        assert!(matches!(
            auth.login("alice", &hash_password("pw")).await,
            Err(SessionError::AuthFailed(_))
        ));
        assert!(!auth.remove_user("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_active_users() {
        let auth = with_user("alice", "pw").await;
        auth.login("alice", &hash_password("pw")).await.unwrap();

        auth.clear_active_users().await.unwrap();
        assert!(auth.active_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_prefix_applies_to_session_key() {
        let config = SessionConfig {
            key_prefix: "session:".into(),
            ..SessionConfig::default()
        };
        let auth = SessionAuthenticator::new(
            MemoryStore::new(),
            Arc::new(PresenceRegistry::new()),
            config,
        );
        auth.register_user("alice", "pw").await.unwrap();
        auth.login("alice", &hash_password("pw")).await.unwrap();

        assert!(auth.store().get("session:alice").await.unwrap().is_some());
        assert!(auth.store().get("alice").await.unwrap().is_none());
    }
}
