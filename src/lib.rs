//! # Sesio (Authenticated Session & Credential Store)
//!
//! `sesio` is the authentication core a storefront's HTTP layer calls into:
//! user registration, password verification, and opaque-token session
//! issuance with cookie scoping and expiry. It is a library; routing,
//! templating, and the rest of the relational store belong to the caller.
//!
//! ## Credentials
//!
//! - **Username Normalization:** usernames are case-folded (Unicode NFKC +
//!   lower-case) before every uniqueness check and lookup.
//! - **Verifiers:** passwords are stored only as self-describing PHC
//!   strings (Argon2id by default, PBKDF2-HMAC-SHA256 as the alternative).
//!   Plaintext is not representable.
//! - **Lockout:** a per-user failure counter locks the account for a
//!   window once it reaches the threshold; the check runs before the KDF.
//!
//! ## Sessions
//!
//! Sessions are opaque and server-side: a 256-bit random token travels in a
//! host-only `HttpOnly` cookie, and the database stores only its SHA-256.
//! A session moves `Active -> (Revoked | Expired)` and never back; idle and
//! absolute timeouts are enforced independently, whichever is reached
//! first. Password changes revoke every session of the user.
//!
//! > **Warning:** login failures are deliberately uniform. "No such user"
//! > and "wrong password" produce the same error and the same KDF cost;
//! > the detailed reason is only ever logged.

pub mod authenticator;
pub mod config;
pub mod cookie;
pub mod credential;
pub mod error;
pub mod password;
mod psl;
pub mod session;
mod store;
pub mod token;

pub use authenticator::{AuthOutcome, Authenticator, LoginResult, RequestMeta, now_unix_seconds};
pub use config::{AuthConfig, KdfAlgorithm, KdfPolicy};
pub use cookie::{CookieDirective, CookiePolicy, SameSite};
pub use credential::{
    CredentialStore, MemoryCredentialStore, PgCredentialStore, UserRecord, normalize_username,
    valid_username,
};
pub use error::AuthError;
pub use password::PasswordHasher;
pub use session::{MemorySessionStore, PgSessionStore, SessionRecord, SessionStore};
