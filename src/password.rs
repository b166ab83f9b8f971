//! Password hashing and verification.
//!
//! Verifiers are PHC strings: algorithm id, cost, and salt travel inside the
//! blob, so verification needs no external config and old verifiers stay
//! checkable after a policy change. Plaintext passwords are never storable;
//! they only exist as [`SecretString`] on the way into the KDF.
//!
//! The KDF is CPU-bound for tens of milliseconds. Callers on an async
//! runtime must move `hash`/`verify` onto a blocking worker; the
//! authenticator does.

use anyhow::anyhow;
use argon2::{Algorithm as Argon2Algorithm, Argon2, Params as Argon2Params, Version};
use password_hash::{PasswordHash, PasswordHasher as _, SaltString};
use pbkdf2::Pbkdf2;
use rand::{RngCore, rngs::OsRng};
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use tracing::error;

use crate::config::{KdfAlgorithm, KdfPolicy};
use crate::error::AuthError;

const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 256;
const PBKDF2_OUTPUT_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    policy: KdfPolicy,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(policy: KdfPolicy) -> Self {
        Self { policy }
    }

    /// Derive a verifier for a new password.
    ///
    /// # Errors
    ///
    /// `WeakPassword` outside the 8..=256 code point window; `Transient` if
    /// the KDF itself fails.
    pub fn hash(&self, password: &SecretString) -> Result<String, AuthError> {
        check_password_policy(password)?;
        self.hash_unchecked(password)
    }

    /// Check a password against a stored verifier.
    ///
    /// Always performs the full derivation, sentinel blobs included; the
    /// digest comparison underneath is constant-time.
    #[must_use]
    pub fn verify(&self, verifier: &str, password: &SecretString) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier) else {
            error!("malformed password verifier in store");
            return false;
        };
        parsed
            .verify_password(
                &[&Argon2::default(), &Pbkdf2],
                password.expose_secret().as_bytes(),
            )
            .is_ok()
    }

    /// True when the stored verifier no longer matches the current policy
    /// (different algorithm, or any cost parameter below policy).
    #[must_use]
    pub fn needs_rehash(&self, verifier: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier) else {
            return true;
        };
        match (self.policy.algorithm, parsed.algorithm.as_str()) {
            (KdfAlgorithm::Argon2id, "argon2id") => {
                let Ok(params) = Argon2Params::try_from(&parsed) else {
                    return true;
                };
                params.m_cost() < self.policy.argon2_memory_kib
                    || params.t_cost() < self.policy.argon2_iterations
                    || params.p_cost() < self.policy.argon2_parallelism
            }
            (KdfAlgorithm::Pbkdf2Sha256, "pbkdf2-sha256") => {
                let Ok(params) = pbkdf2::Params::try_from(&parsed) else {
                    return true;
                };
                params.rounds < self.policy.pbkdf2_iterations
            }
            _ => true,
        }
    }

    /// Verifier of a random throwaway password.
    ///
    /// Used when a username does not exist, so login performs the same KDF
    /// work in both branches and never succeeds.
    pub fn sentinel(&self) -> Result<String, AuthError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| AuthError::Transient(anyhow!("failed to draw sentinel bytes: {err}")))?;
        let throwaway =
            SecretString::from(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes));
        self.hash_unchecked(&throwaway)
    }

    fn hash_unchecked(&self, password: &SecretString) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let raw = password.expose_secret().as_bytes();
        let phc = match self.policy.algorithm {
            KdfAlgorithm::Argon2id => {
                let params = Argon2Params::new(
                    self.policy.argon2_memory_kib,
                    self.policy.argon2_iterations,
                    self.policy.argon2_parallelism,
                    None,
                )
                .map_err(|err| AuthError::Transient(anyhow!("invalid argon2 params: {err}")))?;
                let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params);
                argon2
                    .hash_password(raw, &salt)
                    .map_err(|err| AuthError::Transient(anyhow!("argon2 hashing failed: {err}")))?
                    .to_string()
            }
            KdfAlgorithm::Pbkdf2Sha256 => {
                let params = pbkdf2::Params {
                    rounds: self.policy.pbkdf2_iterations,
                    output_length: PBKDF2_OUTPUT_LENGTH,
                };
                Pbkdf2
                    .hash_password_customized(
                        raw,
                        Some(pbkdf2::Algorithm::Pbkdf2Sha256.ident()),
                        None,
                        params,
                        &salt,
                    )
                    .map_err(|err| AuthError::Transient(anyhow!("pbkdf2 hashing failed: {err}")))?
                    .to_string()
            }
        };
        Ok(phc)
    }
}

fn check_password_policy(password: &SecretString) -> Result<(), AuthError> {
    let chars = password.expose_secret().chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&chars) {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KdfAlgorithm, KdfPolicy};

    // Low-cost parameters keep KDF tests fast; production defaults live in
    // config.rs.
    fn test_policy() -> KdfPolicy {
        KdfPolicy {
            algorithm: KdfAlgorithm::Argon2id,
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            pbkdf2_iterations: 10_000,
        }
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value)
    }

    #[test]
    fn argon2_round_trip() {
        let hasher = PasswordHasher::new(test_policy());
        let verifier = hasher.hash(&secret("Str0ng-pw-123")).expect("hash");
        assert!(verifier.starts_with("$argon2id$"));
        assert!(hasher.verify(&verifier, &secret("Str0ng-pw-123")));
        assert!(!hasher.verify(&verifier, &secret("Str0ng-pw-124")));
    }

    #[test]
    fn pbkdf2_round_trip() {
        let policy = KdfPolicy {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            ..test_policy()
        };
        let hasher = PasswordHasher::new(policy);
        let verifier = hasher.hash(&secret("Str0ng-pw-123")).expect("hash");
        assert!(verifier.starts_with("$pbkdf2-sha256$"));
        assert!(hasher.verify(&verifier, &secret("Str0ng-pw-123")));
        assert!(!hasher.verify(&verifier, &secret("wrong-password")));
    }

    #[test]
    fn short_and_oversized_passwords_are_weak() {
        let hasher = PasswordHasher::new(test_policy());
        assert!(matches!(
            hasher.hash(&secret("short")),
            Err(AuthError::WeakPassword)
        ));
        let oversized = "x".repeat(257);
        assert!(matches!(
            hasher.hash(&secret(&oversized)),
            Err(AuthError::WeakPassword)
        ));
        assert!(hasher.hash(&secret(&"x".repeat(256))).is_ok());
    }

    #[test]
    fn verify_rejects_malformed_blobs() {
        let hasher = PasswordHasher::new(test_policy());
        assert!(!hasher.verify("not-a-phc-string", &secret("Str0ng-pw-123")));
        assert!(!hasher.verify("", &secret("Str0ng-pw-123")));
    }

    #[test]
    fn needs_rehash_on_cost_increase() {
        let hasher = PasswordHasher::new(test_policy());
        let verifier = hasher.hash(&secret("Str0ng-pw-123")).expect("hash");
        assert!(!hasher.needs_rehash(&verifier));

        let stronger = PasswordHasher::new(KdfPolicy {
            argon2_memory_kib: 2048,
            ..test_policy()
        });
        assert!(stronger.needs_rehash(&verifier));
    }

    #[test]
    fn needs_rehash_on_algorithm_change_or_garbage() {
        let argon = PasswordHasher::new(test_policy());
        let pbkdf2 = PasswordHasher::new(KdfPolicy {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            ..test_policy()
        });
        let verifier = argon.hash(&secret("Str0ng-pw-123")).expect("hash");
        assert!(pbkdf2.needs_rehash(&verifier));
        assert!(argon.needs_rehash("$unknown$v=1$abc"));
    }

    #[test]
    fn pbkdf2_needs_rehash_below_rounds() {
        let weak = PasswordHasher::new(KdfPolicy {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            pbkdf2_iterations: 1_000,
            ..test_policy()
        });
        let strong = PasswordHasher::new(KdfPolicy {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            pbkdf2_iterations: 2_000,
            ..test_policy()
        });
        let verifier = weak.hash(&secret("Str0ng-pw-123")).expect("hash");
        assert!(strong.needs_rehash(&verifier));
        assert!(!weak.needs_rehash(&verifier));
    }

    #[test]
    fn sentinel_never_verifies_user_input() {
        let hasher = PasswordHasher::new(test_policy());
        let sentinel = hasher.sentinel().expect("sentinel");
        assert!(sentinel.starts_with("$argon2id$"));
        assert!(!hasher.verify(&sentinel, &secret("Str0ng-pw-123")));
        assert!(!hasher.verify(&sentinel, &secret("")));
    }
}
