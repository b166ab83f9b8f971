//! Session cookie directives.
//!
//! The builder produces the full set-cookie contract for login and logout.
//! The safe default is a host-only cookie: no `Domain` attribute at all, so
//! the browser sends it only to the exact host that set it. A `Domain` is
//! emitted only when cross-subdomain sharing is explicitly configured, and
//! never for a public suffix.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::psl;

pub const DEFAULT_COOKIE_NAME: &str = "sid";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Default; sent on top-level cross-site navigation.
    Lax,
    /// For admin UIs.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lax => f.write_str("Lax"),
            Self::Strict => f.write_str("Strict"),
        }
    }
}

/// Cookie attributes fixed at startup; the per-login parts (value, max-age)
/// are supplied when a directive is built.
#[derive(Clone, Debug)]
pub struct CookiePolicy {
    name: String,
    same_site: SameSite,
    domain: Option<String>,
    development: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            same_site: SameSite::Lax,
            domain: None,
            development: false,
        }
    }
}

impl CookiePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Allow `Secure=false` for plain-HTTP development setups.
    #[must_use]
    pub fn with_development(mut self, development: bool) -> Self {
        if development {
            warn!("DEVELOPMENT_MODE: session cookies will be sent without Secure");
        }
        self.development = development;
        self
    }

    /// Opt in to cross-subdomain sharing by emitting `Domain=<parent>`.
    ///
    /// # Errors
    ///
    /// Refuses empty values and public suffixes; a cookie scoped to `co.uk`
    /// would leak to every site under it.
    pub fn with_domain(mut self, domain: &str) -> Result<Self> {
        let normalized = domain.trim().trim_start_matches('.').to_lowercase();
        if normalized.is_empty() {
            bail!("cookie domain must not be empty");
        }
        if psl::is_public_suffix(&normalized) {
            bail!("refusing cookie domain on public suffix: {normalized}");
        }
        self.domain = Some(normalized);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn host_only(&self) -> bool {
        self.domain.is_none()
    }

    /// Build the set-cookie contract for a freshly minted session token.
    #[must_use]
    pub fn directive(&self, token: &str, max_age_secs: i64) -> CookieDirective {
        CookieDirective {
            name: self.name.clone(),
            value: token.to_string(),
            max_age: max_age_secs,
            path: "/".to_string(),
            secure: !self.development,
            http_only: true,
            same_site: self.same_site,
            domain: self.domain.clone(),
        }
    }

    /// The logout directive: same attributes, empty value, `Max-Age=0` so
    /// the browser honors deletion.
    #[must_use]
    pub fn clear(&self) -> CookieDirective {
        self.directive("", 0)
    }
}

/// One `Set-Cookie` worth of attributes. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub max_age: i64,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// `None` means host-only: no `Domain` attribute is emitted at all.
    pub domain: Option<String>,
}

impl fmt::Display for CookieDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        write!(f, "; SameSite={}; Max-Age={}", self.same_site, self.max_age)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_is_host_only() {
        let policy = CookiePolicy::new();
        let directive = policy.directive("abc123", 3600);
        assert_eq!(
            directive.to_string(),
            "sid=abc123; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=3600"
        );
        assert!(policy.host_only());
    }

    #[test]
    fn development_mode_drops_secure_only() {
        let directive = CookiePolicy::new()
            .with_development(true)
            .directive("t", 60);
        assert_eq!(
            directive.to_string(),
            "sid=t; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        assert!(directive.http_only);
    }

    #[test]
    fn strict_same_site_renders() {
        let directive = CookiePolicy::new()
            .with_same_site(SameSite::Strict)
            .directive("t", 60);
        assert!(directive.to_string().contains("SameSite=Strict"));
    }

    #[test]
    fn explicit_domain_is_emitted_last() {
        let policy = CookiePolicy::new()
            .with_domain(".Example.COM")
            .expect("registrable domain");
        let directive = policy.directive("t", 60);
        assert!(directive.to_string().ends_with("; Domain=example.com"));
        assert!(!policy.host_only());
    }

    #[test]
    fn public_suffix_domains_are_refused() {
        assert!(CookiePolicy::new().with_domain("co.uk").is_err());
        assert!(CookiePolicy::new().with_domain("github.io").is_err());
        assert!(CookiePolicy::new().with_domain("com").is_err());
        assert!(CookiePolicy::new().with_domain("  ").is_err());
    }

    #[test]
    fn directive_serializes_for_structured_logs() {
        let directive = CookiePolicy::new().directive("abc123", 3600);
        let value = serde_json::to_value(&directive).expect("serialize");
        assert_eq!(value["name"], "sid");
        assert_eq!(value["same_site"], "Lax");
        assert_eq!(value["domain"], serde_json::Value::Null);
    }

    #[test]
    fn clear_keeps_attributes_and_zeroes_the_rest() {
        let policy = CookiePolicy::new().with_name("admin_sid".to_string());
        let clear = policy.clear();
        assert_eq!(
            clear.to_string(),
            "admin_sid=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0"
        );
    }
}
