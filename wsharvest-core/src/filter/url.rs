//! Navigable URL validation
//!
//! Catalog consumers render `github_pages` as a link, so anything other than
//! an absolute `http`/`https` URL with a host is refused.

use url::Url;

/// Schemes allowed in published links
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Check that `candidate` is an absolute, navigable HTTP(S) URL
pub fn is_valid_http_url(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.trim() != candidate {
        return false;
    }

    let parsed = match Url::parse(candidate) {
        Ok(url) => url,
        Err(_) => return false,
    };

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return false;
    }

    // `http:example.com` parses leniently; require an explicit authority
    let after_scheme = &candidate[parsed.scheme().len()..];
    if !after_scheme.starts_with("://") {
        return false;
    }

    parsed.host_str().is_some_and(|host| !host.is_empty())
}
