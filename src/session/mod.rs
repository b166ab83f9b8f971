//! Session storage: issuance, revocation, activity tracking, GC.
//!
//! A session moves `Active -> (Revoked | Expired)` and never back. Stores
//! key rows by the SHA-256 of the minted token ([`crate::token::hash`]);
//! the raw cookie value never reaches them. Rows reference users by id
//! only; deleting a user does not cascade here, the authenticator treats
//! the orphaned row as invalid.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// `touch` writes are suppressed unless `last_seen_at` is at least this
/// stale, bounding write amplification on busy sessions.
pub const TOUCH_MIN_INTERVAL_SECS: i64 = 60;

/// One row of the sessions table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
    pub last_seen_at: i64,
    pub revoked: bool,
}

/// Outcome of a session insert; `Conflict` triggers the mint retry.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Conflict,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session keyed by token hash. `expires_at` must be
    /// greater than `issued_at`; `last_seen_at` starts at `issued_at`.
    async fn insert(
        &self,
        session_id: &[u8],
        user_id: Uuid,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<InsertOutcome>;

    async fn get(&self, session_id: &[u8]) -> Result<Option<SessionRecord>>;

    /// Idempotent: revoking a revoked or missing session is not an error.
    async fn revoke(&self, session_id: &[u8]) -> Result<()>;

    /// Revoke every session of one user (password change, admin action).
    /// Idempotent.
    async fn revoke_all(&self, user_id: Uuid) -> Result<()>;

    /// Update `last_seen_at`, at most once per
    /// [`TOUCH_MIN_INTERVAL_SECS`].
    async fn touch(&self, session_id: &[u8], now: i64) -> Result<()>;

    /// Remove rows whose `expires_at` is more than `grace_secs` in the
    /// past. Returns the number of rows removed.
    async fn gc(&self, now: i64, grace_secs: i64) -> Result<u64>;
}
