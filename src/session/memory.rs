//! In-memory session store for tests and development.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{InsertOutcome, SessionRecord, SessionStore, TOUCH_MIN_INTERVAL_SECS};

#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(
        &self,
        session_id: &[u8],
        user_id: Uuid,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(session_id) {
            return Ok(InsertOutcome::Conflict);
        }
        inner.insert(
            session_id.to_vec(),
            SessionRecord {
                user_id,
                issued_at,
                expires_at,
                last_seen_at: issued_at,
                revoked: false,
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, session_id: &[u8]) -> Result<Option<SessionRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.get(session_id).cloned())
    }

    async fn revoke(&self, session_id: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.get_mut(session_id) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for session in inner.values_mut() {
            if session.user_id == user_id {
                session.revoked = true;
            }
        }
        Ok(())
    }

    async fn touch(&self, session_id: &[u8], now: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.get_mut(session_id) {
            if !session.revoked && session.last_seen_at <= now - TOUCH_MIN_INTERVAL_SECS {
                session.last_seen_at = now;
            }
        }
        Ok(())
    }

    async fn gc(&self, now: i64, grace_secs: i64) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|_, session| session.expires_at >= now - grace_secs);
        Ok((before - inner.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        assert!(matches!(
            store.insert(&key(1), user_id, 1_000, 4_600).await,
            Ok(InsertOutcome::Inserted)
        ));
        let session = store.get(&key(1)).await.expect("get").expect("some");
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.last_seen_at, 1_000);
        assert!(!session.revoked);
        assert!(store.get(&key(2)).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn duplicate_key_conflicts() {
        let store = MemorySessionStore::new();
        store
            .insert(&key(1), Uuid::new_v4(), 1_000, 4_600)
            .await
            .expect("insert");
        assert!(matches!(
            store.insert(&key(1), Uuid::new_v4(), 1_000, 4_600).await,
            Ok(InsertOutcome::Conflict)
        ));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = MemorySessionStore::new();
        store
            .insert(&key(1), Uuid::new_v4(), 1_000, 4_600)
            .await
            .expect("insert");
        store.revoke(&key(1)).await.expect("revoke");
        store.revoke(&key(1)).await.expect("revoke again");
        store.revoke(&key(9)).await.expect("revoke missing");
        assert!(store.get(&key(1)).await.expect("get").expect("some").revoked);
    }

    #[tokio::test]
    async fn revoke_all_hits_only_that_user() {
        let store = MemorySessionStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert(&key(1), alice, 1_000, 4_600).await.expect("insert");
        store.insert(&key(2), alice, 1_000, 4_600).await.expect("insert");
        store.insert(&key(3), bob, 1_000, 4_600).await.expect("insert");
        store.revoke_all(alice).await.expect("revoke_all");
        store.revoke_all(alice).await.expect("revoke_all again");
        assert!(store.get(&key(1)).await.expect("get").expect("some").revoked);
        assert!(store.get(&key(2)).await.expect("get").expect("some").revoked);
        assert!(!store.get(&key(3)).await.expect("get").expect("some").revoked);
    }

    #[tokio::test]
    async fn touch_is_throttled() {
        let store = MemorySessionStore::new();
        store
            .insert(&key(1), Uuid::new_v4(), 1_000, 4_600)
            .await
            .expect("insert");

        // Too soon: below the minimum interval.
        store.touch(&key(1), 1_030).await.expect("touch");
        let session = store.get(&key(1)).await.expect("get").expect("some");
        assert_eq!(session.last_seen_at, 1_000);

        store.touch(&key(1), 1_060).await.expect("touch");
        let session = store.get(&key(1)).await.expect("get").expect("some");
        assert_eq!(session.last_seen_at, 1_060);
    }

    #[tokio::test]
    async fn gc_removes_only_past_grace() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        store.insert(&key(1), user_id, 0, 1_000).await.expect("insert");
        store.insert(&key(2), user_id, 0, 5_000).await.expect("insert");

        // Expired but within grace: kept.
        let removed = store.gc(1_500, 3_600).await.expect("gc");
        assert_eq!(removed, 0);

        let removed = store.gc(4_601, 3_600).await.expect("gc");
        assert_eq!(removed, 1);
        assert!(store.get(&key(1)).await.expect("get").is_none());
        assert!(store.get(&key(2)).await.expect("get").is_some());
    }
}
