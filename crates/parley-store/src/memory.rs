//! In-process store with Redis-like value kinds and key expiry.
//!
//! Expiry is measured on Tokio's clock (`tokio::time::Instant`), so tests
//! can pause time and `advance` past a TTL instead of sleeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Entries = HashMap<String, Entry>;

/// A [`KeyValueStore`] that keeps everything in memory.
///
/// Clones share the same data, so a test can hand one clone to the server
/// and inspect the store through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns `true` if the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Drops `key` if it has expired, then returns the live entry if any.
fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

impl KeyValueStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key).is_some() && entries.remove(key).is_some())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            None => Ok(None),
            Some(Entry { value: Value::Hash(h), .. }) => Ok(h.get(field).cloned()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match live(&mut entries, key) {
            Some(Entry { value: Value::Hash(h), .. }) => {
                h.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                },
            );
        }
        match live(&mut entries, key) {
            Some(Entry { value: Value::Set(s), .. }) => Ok(s.insert(member.to_string())),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let (removed, now_empty) = match live(&mut entries, key) {
            None => return Ok(false),
            Some(Entry { value: Value::Set(s), .. }) => (s.remove(member), s.is_empty()),
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        // Redis deletes a set once its last member is removed.
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::Set(s), .. }) => Ok(s.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nobody").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_value_expires_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_ex("alice", "{}", Duration::from_secs(1800))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(1799)).await;
        assert_eq!(store.get("alice").await.unwrap().as_deref(), Some("{}"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("alice").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_overwrite_resets_ttl() {
        let store = MemoryStore::new();
        store.set_ex("k", "old", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.set_ex("k", "new", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_del_reports_whether_key_existed() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();

        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_fields() {
        let store = MemoryStore::new();
        store.hset("user:alice", "password_hash", "h1").await.unwrap();

        assert_eq!(
            store.hget("user:alice", "password_hash").await.unwrap().as_deref(),
            Some("h1")
        );
        assert_eq!(store.hget("user:alice", "email").await.unwrap(), None);
        assert_eq!(store.hget("user:bob", "password_hash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        assert!(store.sadd("active_users", "alice").await.unwrap());
        assert!(!store.sadd("active_users", "alice").await.unwrap());
        assert!(store.sadd("active_users", "bob").await.unwrap());

        let mut members = store.smembers("active_users").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["alice", "bob"]);

        assert!(store.srem("active_users", "alice").await.unwrap());
        assert!(!store.srem("active_users", "alice").await.unwrap());
        assert!(!store.srem("nothing", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_set_member_removal_deletes_key() {
        let store = MemoryStore::new();
        store.sadd("active_users", "alice").await.unwrap();
        store.srem("active_users", "alice").await.unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_wrong_kind_is_an_error() {
        let store = MemoryStore::new();
        store.sadd("active_users", "alice").await.unwrap();

        assert!(matches!(
            store.get("active_users").await,
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(
            store.hset("active_users", "f", "v").await,
            Err(StoreError::WrongType(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.hset("user:alice", "password_hash", "h1").await.unwrap();

        assert!(other.hget("user:alice", "password_hash").await.unwrap().is_some());
    }
}
