//! Login, request authentication, logout, and password change.
//!
//! The [`Authenticator`] is the only externally visible surface: the HTTP
//! layer calls it and turns the returned data into responses. It is an
//! explicit context struct built at startup; there are no process-wide
//! singletons. Stores and hasher never call back into it.

use anyhow::anyhow;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::cookie::CookieDirective;
use crate::credential::{
    CreateUserOutcome, CredentialStore, UserRecord, normalize_username, valid_username,
};
use crate::error::AuthError;
use crate::password::PasswordHasher;
use crate::session::{InsertOutcome, SessionStore};
use crate::token;

/// Attempts to find an unused token hash before giving up. With 256-bit
/// tokens a single collision is already astronomically unlikely.
const MINT_ATTEMPTS: usize = 3;

/// Current Unix time in seconds.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Request context for log enrichment. Never used for decisions.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A successful login: the raw token goes into the cookie, nowhere else.
#[derive(Clone, Debug)]
pub struct LoginResult {
    pub user_id: Uuid,
    pub session_token: String,
    pub cookie: CookieDirective,
}

/// Outcome of authenticating a request cookie.
///
/// `Invalid` covers missing, expired, revoked, idle, and orphaned sessions
/// alike; the distinction is logged, never returned. Callers should answer
/// `Invalid` with a clearing cookie directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No cookie was presented.
    Anonymous,
    /// A cookie was presented but does not map to a live session.
    Invalid,
    Authenticated { user_id: Uuid },
}

pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<PasswordHasher>,
    config: AuthConfig,
    /// Verifier of a throwaway password; verified for unknown usernames so
    /// both login branches pay the same KDF cost.
    sentinel: String,
}

impl Authenticator {
    /// Build the context. Mints the sentinel verifier once, which runs the
    /// KDF and therefore takes tens of milliseconds.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let hasher = Arc::new(PasswordHasher::new(config.kdf().clone()));
        let sentinel = hasher.sentinel()?;
        Ok(Self {
            credentials,
            sessions,
            hasher,
            config,
            sentinel,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create a user. Does not log the user in: registration never
    /// produces a cookie, session issuance is a separate explicit step.
    pub async fn register(
        &self,
        username: &str,
        password: SecretString,
    ) -> Result<Uuid, AuthError> {
        let username = normalize_username(username);
        if !valid_username(&username) {
            return Err(AuthError::InvalidUsername);
        }
        // Hash first so weak passwords fail before any row exists.
        let verifier = self.hash_on_worker(password).await?;
        let now = now_unix_seconds();
        match self.credentials.create_user(&username, &verifier, now).await? {
            CreateUserOutcome::Created(user_id) => {
                info!(%user_id, "user registered");
                Ok(user_id)
            }
            CreateUserOutcome::Conflict => Err(AuthError::UsernameTaken),
        }
    }

    /// Verify credentials and issue a session.
    ///
    /// The externally observable failures are exactly `AccountLocked`,
    /// `InvalidCredentials`, and `Transient`; "no such user" and "wrong
    /// password" are indistinguishable by both response and hash timing.
    pub async fn login(
        &self,
        username: &str,
        password: SecretString,
        meta: &RequestMeta,
    ) -> Result<LoginResult, AuthError> {
        let username = normalize_username(username);
        let now = now_unix_seconds();
        let user = self.credentials.lookup(&username).await?;

        if let Some(user) = &user {
            // Locked accounts fail before the KDF runs, so a flood of
            // attempts against one account cannot saturate the workers.
            if user.is_locked(now) {
                let until = user.locked_until.unwrap_or(now);
                debug!(user_id = %user.user_id, until, "login rejected: account locked");
                return Err(AuthError::AccountLocked { until });
            }
        }

        let verifier = user
            .as_ref()
            .map_or_else(|| self.sentinel.clone(), |user| user.verifier.clone());
        let verified = self.verify_on_worker(verifier, password.clone()).await?;

        let Some(user) = user else {
            debug!(client_ip = meta.client_ip.as_deref(), "login failed: unknown username");
            return Err(AuthError::InvalidCredentials);
        };
        if !verified {
            // A failure here must not turn into Transient: the password was
            // wrong regardless of whether the counter write went through.
            match self
                .credentials
                .record_failed(
                    user.user_id,
                    now,
                    self.config.failed_threshold(),
                    self.config.lockout_window_secs(),
                )
                .await
            {
                Ok(failed_count) => {
                    debug!(user_id = %user.user_id, failed_count, "login failed: wrong password");
                }
                Err(err) => error!(user_id = %user.user_id, "failed to record login failure: {err}"),
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.credentials.record_success(user.user_id).await?;
        self.rehash_if_stale(&user, password);

        let issued_at = now;
        let expires_at = issued_at + self.config.session_absolute_secs();
        let session_token = self.insert_session(user.user_id, issued_at, expires_at).await?;

        let cookie = self
            .config
            .cookie()
            .directive(&session_token, self.config.session_idle_secs());

        info!(
            user_id = %user.user_id,
            client_ip = meta.client_ip.as_deref(),
            user_agent = meta.user_agent.as_deref(),
            "login succeeded"
        );

        Ok(LoginResult {
            user_id: user.user_id,
            session_token,
            cookie,
        })
    }

    /// Resolve a request cookie into an authenticated principal.
    pub async fn authenticate_request(
        &self,
        cookie_value: Option<&str>,
        now: i64,
    ) -> Result<AuthOutcome, AuthError> {
        let Some(token_value) = cookie_value.map(str::trim).filter(|value| !value.is_empty())
        else {
            return Ok(AuthOutcome::Anonymous);
        };
        let session_id = token::hash(token_value);

        let Some(session) = self.sessions.get(&session_id).await? else {
            debug!("request cookie maps to no session");
            return Ok(AuthOutcome::Invalid);
        };
        if session.revoked {
            debug!(user_id = %session.user_id, "request session is revoked");
            return Ok(AuthOutcome::Invalid);
        }
        if session.expires_at <= now {
            debug!(user_id = %session.user_id, "request session is expired");
            return Ok(AuthOutcome::Invalid);
        }
        if now - session.last_seen_at > self.config.session_idle_secs() {
            debug!(user_id = %session.user_id, "request session idle too long, revoking");
            if let Err(err) = self.sessions.revoke(&session_id).await {
                error!("failed to revoke idle session: {err}");
            }
            return Ok(AuthOutcome::Invalid);
        }
        // A session whose user row is gone authenticates nobody.
        if self.credentials.lookup_by_id(session.user_id).await?.is_none() {
            warn!(user_id = %session.user_id, "request session is orphaned, revoking");
            if let Err(err) = self.sessions.revoke(&session_id).await {
                error!("failed to revoke orphaned session: {err}");
            }
            return Ok(AuthOutcome::Invalid);
        }

        if let Err(err) = self.sessions.touch(&session_id, now).await {
            error!(user_id = %session.user_id, "failed to touch session: {err}");
        }
        Ok(AuthOutcome::Authenticated {
            user_id: session.user_id,
        })
    }

    /// Revoke the presented session, if any, and return the clearing
    /// directive. Always clears the cookie, even when the session was
    /// already gone or the store write failed.
    pub async fn logout(&self, cookie_value: Option<&str>) -> CookieDirective {
        if let Some(token_value) = cookie_value.map(str::trim).filter(|value| !value.is_empty()) {
            let session_id = token::hash(token_value);
            if let Err(err) = self.sessions.revoke(&session_id).await {
                error!("failed to revoke session on logout: {err}");
            }
        }
        self.config.cookie().clear()
    }

    /// Verify the old password, store a new verifier, and revoke every
    /// session of the user (session fixation defense).
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: SecretString,
        new_password: SecretString,
    ) -> Result<(), AuthError> {
        let Some(user) = self.credentials.lookup_by_id(user_id).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let verified = self
            .verify_on_worker(user.verifier.clone(), old_password)
            .await?;
        if !verified {
            debug!(%user_id, "password change rejected: wrong old password");
            return Err(AuthError::InvalidCredentials);
        }
        let verifier = self.hash_on_worker(new_password).await?;
        self.credentials.update_verifier(user_id, &verifier).await?;
        self.sessions.revoke_all(user_id).await?;
        info!(%user_id, "password changed, all sessions revoked");
        Ok(())
    }

    /// Sweep sessions expired for longer than the grace window.
    pub async fn gc(&self, now: i64) -> Result<u64, AuthError> {
        let removed = self
            .sessions
            .gc(now, self.config.gc_grace_secs())
            .await?;
        if removed > 0 {
            debug!(removed, "session gc sweep");
        }
        Ok(removed)
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<String, AuthError> {
        for _ in 0..MINT_ATTEMPTS {
            let session_token = token::mint()?;
            let session_id = token::hash(&session_token);
            match self
                .sessions
                .insert(&session_id, user_id, issued_at, expires_at)
                .await?
            {
                InsertOutcome::Inserted => return Ok(session_token),
                InsertOutcome::Conflict => {
                    warn!(%user_id, "session token collision, reminting");
                }
            }
        }
        Err(AuthError::Transient(anyhow!(
            "failed to mint a unique session token"
        )))
    }

    /// Best-effort background rehash after a successful login; a failure
    /// is logged and never blocks the login.
    fn rehash_if_stale(&self, user: &UserRecord, password: SecretString) {
        if !self.hasher.needs_rehash(&user.verifier) {
            return;
        }
        let hasher = Arc::clone(&self.hasher);
        let credentials = Arc::clone(&self.credentials);
        let user_id = user.user_id;
        tokio::spawn(async move {
            let rehashed =
                tokio::task::spawn_blocking(move || hasher.hash(&password)).await;
            match rehashed {
                Ok(Ok(verifier)) => {
                    if let Err(err) = credentials.update_verifier(user_id, &verifier).await {
                        error!(%user_id, "background rehash store update failed: {err}");
                    } else {
                        info!(%user_id, "verifier rehashed to current policy");
                    }
                }
                Ok(Err(err)) => error!(%user_id, "background rehash failed: {err}"),
                Err(err) => error!(%user_id, "background rehash task failed: {err}"),
            }
        });
    }

    async fn hash_on_worker(&self, password: SecretString) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| AuthError::Transient(anyhow!("hashing task failed: {err}")))?
    }

    /// Runs the KDF on a blocking worker so a single-reactor runtime keeps
    /// accepting requests. Not cancellable mid-hash; the worker always runs
    /// to completion.
    async fn verify_on_worker(
        &self,
        verifier: String,
        password: SecretString,
    ) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&verifier, &password))
            .await
            .map_err(|err| AuthError::Transient(anyhow!("verification task failed: {err}")))
    }
}
