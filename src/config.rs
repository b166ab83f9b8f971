//! Authenticator configuration.
//!
//! Builder-style with const defaults; `from_env` recognizes the deployment
//! knobs and falls back loudly on anything it cannot parse. The library
//! reads the environment only here.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::cookie::{CookiePolicy, SameSite};

const DEFAULT_SESSION_IDLE_MINUTES: i64 = 60;
const DEFAULT_SESSION_ABSOLUTE_HOURS: i64 = 12;
const DEFAULT_FAILED_THRESHOLD: i32 = 10;
const DEFAULT_LOCKOUT_WINDOW_MINUTES: i64 = 15;
const DEFAULT_GC_GRACE_HOURS: i64 = 24;

const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19_456;
const DEFAULT_ARGON2_ITERATIONS: u32 = 2;
const DEFAULT_ARGON2_PARALLELISM: u32 = 1;
const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;
/// Floor below which PBKDF2 verifiers are considered stale.
pub const PBKDF2_MIN_ITERATIONS: u32 = 310_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    Argon2id,
    Pbkdf2Sha256,
}

/// Cost policy for the password hasher. Stored verifiers are
/// self-describing, so this only governs new hashes and `needs_rehash`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfPolicy {
    pub algorithm: KdfAlgorithm,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub pbkdf2_iterations: u32,
}

impl Default for KdfPolicy {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            argon2_memory_kib: DEFAULT_ARGON2_MEMORY_KIB,
            argon2_iterations: DEFAULT_ARGON2_ITERATIONS,
            argon2_parallelism: DEFAULT_ARGON2_PARALLELISM,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_idle_minutes: i64,
    session_absolute_hours: i64,
    failed_threshold: i32,
    lockout_window_minutes: i64,
    gc_grace_hours: i64,
    kdf: KdfPolicy,
    cookie: CookiePolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_idle_minutes: DEFAULT_SESSION_IDLE_MINUTES,
            session_absolute_hours: DEFAULT_SESSION_ABSOLUTE_HOURS,
            failed_threshold: DEFAULT_FAILED_THRESHOLD,
            lockout_window_minutes: DEFAULT_LOCKOUT_WINDOW_MINUTES,
            gc_grace_hours: DEFAULT_GC_GRACE_HOURS,
            kdf: KdfPolicy::default(),
            cookie: CookiePolicy::default(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from the recognized environment variables.
    ///
    /// Unset variables keep their defaults; unparsable values are logged and
    /// ignored rather than aborting startup.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default()
            .with_session_idle_minutes(env_i64(
                "SESSION_IDLE_MINUTES",
                DEFAULT_SESSION_IDLE_MINUTES,
            ))
            .with_session_absolute_hours(env_i64(
                "SESSION_ABSOLUTE_HOURS",
                DEFAULT_SESSION_ABSOLUTE_HOURS,
            ))
            .with_failed_threshold(env_i32("FAILED_THRESHOLD", DEFAULT_FAILED_THRESHOLD))
            .with_lockout_window_minutes(env_i64(
                "LOCKOUT_WINDOW_MINUTES",
                DEFAULT_LOCKOUT_WINDOW_MINUTES,
            ));

        config.kdf = kdf_from_env();

        let mut cookie = CookiePolicy::new();
        if let Ok(name) = env::var("COOKIE_NAME") {
            if !name.trim().is_empty() {
                cookie = cookie.with_name(name.trim().to_string());
            }
        }
        if let Ok(same_site) = env::var("COOKIE_SAME_SITE") {
            match same_site.trim().to_lowercase().as_str() {
                "strict" => cookie = cookie.with_same_site(SameSite::Strict),
                "lax" | "" => {}
                other => warn!(value = other, "unrecognized COOKIE_SAME_SITE, keeping Lax"),
            }
        }
        if env_bool("DEVELOPMENT_MODE") {
            cookie = cookie.with_development(true);
        }
        if let Ok(domain) = env::var("COOKIE_DOMAIN") {
            if !domain.trim().is_empty() {
                match cookie.clone().with_domain(&domain) {
                    Ok(scoped) => cookie = scoped,
                    Err(err) => warn!("COOKIE_DOMAIN rejected, staying host-only: {err}"),
                }
            }
        }
        config.cookie = cookie;
        config
    }

    #[must_use]
    pub fn with_session_idle_minutes(mut self, minutes: i64) -> Self {
        self.session_idle_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_session_absolute_hours(mut self, hours: i64) -> Self {
        self.session_absolute_hours = hours;
        self
    }

    #[must_use]
    pub fn with_failed_threshold(mut self, threshold: i32) -> Self {
        self.failed_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_window_minutes(mut self, minutes: i64) -> Self {
        self.lockout_window_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_gc_grace_hours(mut self, hours: i64) -> Self {
        self.gc_grace_hours = hours;
        self
    }

    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfPolicy) -> Self {
        self.kdf = kdf;
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: CookiePolicy) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn session_idle_secs(&self) -> i64 {
        self.session_idle_minutes * 60
    }

    #[must_use]
    pub fn session_absolute_secs(&self) -> i64 {
        self.session_absolute_hours * 3600
    }

    #[must_use]
    pub fn failed_threshold(&self) -> i32 {
        self.failed_threshold
    }

    #[must_use]
    pub fn lockout_window_secs(&self) -> i64 {
        self.lockout_window_minutes * 60
    }

    #[must_use]
    pub fn gc_grace_secs(&self) -> i64 {
        self.gc_grace_hours * 3600
    }

    #[must_use]
    pub fn kdf(&self) -> &KdfPolicy {
        &self.kdf
    }

    #[must_use]
    pub fn cookie(&self) -> &CookiePolicy {
        &self.cookie
    }
}

fn kdf_from_env() -> KdfPolicy {
    let mut kdf = KdfPolicy::default();
    if let Ok(algorithm) = env::var("KDF_ALGORITHM") {
        match algorithm.trim().to_lowercase().as_str() {
            "argon2id" | "" => {}
            "pbkdf2_sha256" => kdf.algorithm = KdfAlgorithm::Pbkdf2Sha256,
            other => warn!(value = other, "unrecognized KDF_ALGORITHM, keeping argon2id"),
        }
    }
    kdf.argon2_memory_kib = env_u32("KDF_MEMORY_KIB", kdf.argon2_memory_kib);
    kdf.argon2_iterations = env_u32("KDF_ITERATIONS", kdf.argon2_iterations);
    kdf.argon2_parallelism = env_u32("KDF_PARALLELISM", kdf.argon2_parallelism);
    let iterations = env_u32("PBKDF2_ITERATIONS", kdf.pbkdf2_iterations);
    if iterations < PBKDF2_MIN_ITERATIONS {
        warn!(
            requested = iterations,
            floor = PBKDF2_MIN_ITERATIONS,
            "PBKDF2_ITERATIONS below floor, clamping"
        );
        kdf.pbkdf2_iterations = PBKDF2_MIN_ITERATIONS;
    } else {
        kdf.pbkdf2_iterations = iterations;
    }
    kdf
}

fn env_i64(name: &str, default: i64) -> i64 {
    env_parse(name, default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env_parse(name, default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env_parse(name, default)
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(name: &str) -> bool {
    env::var(name).is_ok_and(|value| {
        matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = AuthConfig::default();
        assert_eq!(config.session_idle_secs(), 3600);
        assert_eq!(config.session_absolute_secs(), 12 * 3600);
        assert_eq!(config.failed_threshold(), 10);
        assert_eq!(config.lockout_window_secs(), 15 * 60);
        assert_eq!(config.gc_grace_secs(), 24 * 3600);
        assert_eq!(config.kdf().algorithm, KdfAlgorithm::Argon2id);
        assert_eq!(config.cookie().name(), "sid");
        assert!(config.cookie().host_only());
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new()
            .with_session_idle_minutes(5)
            .with_session_absolute_hours(1)
            .with_failed_threshold(3)
            .with_lockout_window_minutes(1)
            .with_gc_grace_hours(2);
        assert_eq!(config.session_idle_secs(), 300);
        assert_eq!(config.session_absolute_secs(), 3600);
        assert_eq!(config.failed_threshold(), 3);
        assert_eq!(config.lockout_window_secs(), 60);
        assert_eq!(config.gc_grace_secs(), 7200);
    }

    #[test]
    fn from_env_reads_recognized_options() {
        temp_env::with_vars(
            [
                ("SESSION_IDLE_MINUTES", Some("30")),
                ("SESSION_ABSOLUTE_HOURS", Some("2")),
                ("FAILED_THRESHOLD", Some("5")),
                ("LOCKOUT_WINDOW_MINUTES", Some("20")),
                ("KDF_ALGORITHM", Some("pbkdf2_sha256")),
                ("PBKDF2_ITERATIONS", Some("400000")),
                ("COOKIE_NAME", Some("shop_sid")),
                ("COOKIE_SAME_SITE", Some("Strict")),
            ],
            || {
                let config = AuthConfig::from_env();
                assert_eq!(config.session_idle_secs(), 1800);
                assert_eq!(config.session_absolute_secs(), 7200);
                assert_eq!(config.failed_threshold(), 5);
                assert_eq!(config.lockout_window_secs(), 1200);
                assert_eq!(config.kdf().algorithm, KdfAlgorithm::Pbkdf2Sha256);
                assert_eq!(config.kdf().pbkdf2_iterations, 400_000);
                assert_eq!(config.cookie().name(), "shop_sid");
            },
        );
    }

    #[test]
    fn from_env_clamps_pbkdf2_floor_and_keeps_bad_values() {
        temp_env::with_vars(
            [
                ("PBKDF2_ITERATIONS", Some("1000")),
                ("SESSION_IDLE_MINUTES", Some("not-a-number")),
                ("COOKIE_DOMAIN", Some("co.uk")),
            ],
            || {
                let config = AuthConfig::from_env();
                assert_eq!(config.kdf().pbkdf2_iterations, PBKDF2_MIN_ITERATIONS);
                assert_eq!(config.session_idle_secs(), 3600);
                // Public-suffix domain is refused; cookie stays host-only.
                assert!(config.cookie().host_only());
            },
        );
    }

    #[test]
    fn from_env_accepts_registrable_cookie_domain() {
        temp_env::with_vars([("COOKIE_DOMAIN", Some("shop.example.com"))], || {
            let config = AuthConfig::from_env();
            assert!(!config.cookie().host_only());
        });
    }
}
