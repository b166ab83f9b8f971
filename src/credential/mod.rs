//! Credential storage: users, verifiers, and the lockout counter.
//!
//! The credential store exclusively owns user rows. Callers hand it
//! *normalized* usernames (see [`normalize_username`]) and opaque verifier
//! blobs; it never sees a plaintext password. Per-user failure accounting is
//! a single conditional update, so concurrent failed logins cannot corrupt
//! the counter.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Usernames longer than this (in code points) are rejected.
pub const USERNAME_MAX_LENGTH: usize = 64;

/// Case-fold a username for uniqueness checks and storage: Unicode NFKC,
/// trimmed, lower-cased.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    let normalized = username.nfkc().collect::<String>();
    normalized.trim().to_lowercase()
}

/// Validate an already-normalized username: non-empty, at most 64 code
/// points, no control or format characters.
#[must_use]
pub fn valid_username(username_normalized: &str) -> bool {
    let length = username_normalized.chars().count();
    if length == 0 || length > USERNAME_MAX_LENGTH {
        return false;
    }
    Regex::new(r"^\P{C}+$").is_ok_and(|regex| regex.is_match(username_normalized))
}

/// One row of the users table.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub username: String,
    pub verifier: String,
    pub failed_count: i32,
    /// Unix seconds; `Some` only while a lockout is pending.
    pub locked_until: Option<i64>,
    pub created_at: i64,
}

impl UserRecord {
    /// True iff a lockout is set and still in the future.
    #[must_use]
    pub fn is_locked(&self, now: i64) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Outcome when attempting to create a new user row.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(Uuid),
    Conflict,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user row. `Conflict` when the normalized username is taken.
    async fn create_user(
        &self,
        username_normalized: &str,
        verifier: &str,
        now: i64,
    ) -> Result<CreateUserOutcome>;

    /// Look up by normalized username. `None` for unknown users; the
    /// authenticator substitutes a sentinel verifier so the password hash
    /// still runs.
    async fn lookup(&self, username_normalized: &str) -> Result<Option<UserRecord>>;

    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>>;

    /// Atomically bump the failure counter, locking the account when it
    /// reaches `failed_threshold`. A failure arriving after an expired
    /// lockout restarts the count at 1. Returns the new count.
    async fn record_failed(
        &self,
        user_id: Uuid,
        now: i64,
        failed_threshold: i32,
        lockout_window_secs: i64,
    ) -> Result<i32>;

    /// Reset the failure counter and clear any lockout.
    async fn record_success(&self, user_id: Uuid) -> Result<()>;

    /// Replace the stored verifier (rehash-on-login, password change).
    async fn update_verifier(&self, user_id: Uuid, verifier: &str) -> Result<()>;
}
