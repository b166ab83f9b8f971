//! Public-suffix snapshot for cookie `Domain` validation.
//!
//! A cookie `Domain` on a public suffix (`co.uk`, `github.io`, ...) would be
//! shared across unrelated sites, so the cookie builder refuses them. This is
//! a snapshot of the common entries, not the full list; anything without a
//! second label is treated as a suffix as well.

/// Multi-label entries from the Public Suffix List, lower-case.
const SUFFIX_SNAPSHOT: &[&str] = &[
    "ac.uk",
    "co.in",
    "co.jp",
    "co.kr",
    "co.nz",
    "co.uk",
    "co.za",
    "com.ar",
    "com.au",
    "com.br",
    "com.cn",
    "com.mx",
    "com.sg",
    "com.tr",
    "com.tw",
    "gov.uk",
    "ne.jp",
    "net.au",
    "or.jp",
    "org.au",
    "org.uk",
    "azurewebsites.net",
    "cloudfront.net",
    "firebaseapp.com",
    "github.io",
    "gitlab.io",
    "herokuapp.com",
    "netlify.app",
    "pages.dev",
    "s3.amazonaws.com",
    "vercel.app",
    "web.app",
    "workers.dev",
];

/// True when `domain` must not appear as a cookie `Domain` attribute.
///
/// Input should already be trimmed of a leading dot and lower-cased.
pub(crate) fn is_public_suffix(domain: &str) -> bool {
    // A bare label ("com", "localhost-less TLDs") can never scope a cookie
    // to a single site.
    if !domain.contains('.') {
        return true;
    }
    SUFFIX_SNAPSHOT.contains(&domain)
}

#[cfg(test)]
mod tests {
    use super::is_public_suffix;

    #[test]
    fn bare_labels_are_suffixes() {
        assert!(is_public_suffix("com"));
        assert!(is_public_suffix("uk"));
        assert!(is_public_suffix("localhost"));
    }

    #[test]
    fn known_multi_label_suffixes_are_rejected() {
        assert!(is_public_suffix("co.uk"));
        assert!(is_public_suffix("github.io"));
        assert!(is_public_suffix("s3.amazonaws.com"));
    }

    #[test]
    fn registrable_domains_pass() {
        assert!(!is_public_suffix("example.com"));
        assert!(!is_public_suffix("example.co.uk"));
        assert!(!is_public_suffix("shop.example.com"));
    }
}
