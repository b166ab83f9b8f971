//! In-memory credential store for tests and development.
//!
//! Same contract as the Postgres store; a single async mutex stands in for
//! the per-row locks, which keeps the failure accounting serialized.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CreateUserOutcome, CredentialStore, UserRecord};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    by_username: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(
        &self,
        username_normalized: &str,
        verifier: &str,
        now: i64,
    ) -> Result<CreateUserOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.by_username.contains_key(username_normalized) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let user_id = Uuid::new_v4();
        inner
            .by_username
            .insert(username_normalized.to_string(), user_id);
        inner.users.insert(
            user_id,
            UserRecord {
                user_id,
                username: username_normalized.to_string(),
                verifier: verifier.to_string(),
                failed_count: 0,
                locked_until: None,
                created_at: now,
            },
        );
        Ok(CreateUserOutcome::Created(user_id))
    }

    async fn lookup(&self, username_normalized: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_username
            .get(username_normalized)
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn record_failed(
        &self,
        user_id: Uuid,
        now: i64,
        failed_threshold: i32,
        lockout_window_secs: i64,
    ) -> Result<i32> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("no such user: {user_id}"))?;
        if user.locked_until.is_some_and(|until| until <= now) {
            // Expired lockout: the next failure increments from zero.
            user.failed_count = 1;
            user.locked_until = None;
        } else {
            user.failed_count += 1;
            if user.failed_count >= failed_threshold {
                user.locked_until = Some(now + lockout_window_secs);
            }
        }
        Ok(user.failed_count)
    }

    async fn record_success(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.failed_count = 0;
            user.locked_until = None;
        }
        Ok(())
    }

    async fn update_verifier(&self, user_id: Uuid, verifier: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.verifier = verifier.to_string();
        }
        Ok(())
    }
}
