//! Error taxonomy for the authenticator surface.
//!
//! Every login failure that a caller could use to probe for accounts is
//! collapsed into [`AuthError::InvalidCredentials`]; the detailed reason is
//! only ever logged. Backend failures surface as [`AuthError::Transient`]
//! and are safe to retry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Login failed. Covers both "no such user" and "wrong password";
    /// callers must not be able to tell them apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Too many failed attempts. `until` is Unix seconds.
    #[error("account locked until {until}")]
    AccountLocked { until: i64 },

    /// Registration collided with an existing username.
    #[error("username already taken")]
    UsernameTaken,

    /// Empty, oversized, or control-character username.
    #[error("invalid username")]
    InvalidUsername,

    /// Password outside the accepted length window.
    #[error("weak password")]
    WeakPassword,

    /// Store or hasher failure; the caller should retry.
    #[error("transient backend failure")]
    Transient(#[from] anyhow::Error),
}

impl AuthError {
    /// True for failures the caller can fix by changing the input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;
    use anyhow::anyhow;

    #[test]
    fn display_messages_stay_generic() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid credentials"
        );
        assert_eq!(
            AuthError::AccountLocked { until: 1700000000 }.to_string(),
            "account locked until 1700000000"
        );
        assert_eq!(AuthError::UsernameTaken.to_string(), "username already taken");
    }

    #[test]
    fn transient_is_not_a_client_error() {
        assert!(!AuthError::Transient(anyhow!("pool exhausted")).is_client_error());
        assert!(AuthError::WeakPassword.is_client_error());
        assert!(AuthError::InvalidUsername.is_client_error());
    }

    #[test]
    fn transient_converts_from_anyhow() {
        let err: AuthError = anyhow!("connection reset").into();
        assert!(matches!(err, AuthError::Transient(_)));
    }
}
