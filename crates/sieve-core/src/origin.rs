//! Origin classification: first-party vs third-party requests
//!
//! Two hosts belong to the same origin when one equals the other or is a
//! subdomain of it, after dropping a leading `www.`. This is the domain model
//! filter lists are written against; it deliberately does not consult a public
//! suffix list.
//!
//! # Examples
//!
//! ```
//! use sieve_core::origin::is_third_party;
//!
//! assert_eq!(is_third_party("www.example.com", "https://example.com/x"), Ok(false));
//! assert_eq!(is_third_party("example.com", "https://cdn.tracker.net/t.js"), Ok(true));
//! ```

use std::borrow::Cow;

/// Why a request URL could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("malformed request URL: {0}")]
    MalformedUrl(#[from] ::url::ParseError),
    #[error("request URL has no host")]
    MissingHost,
}

/// Strip a single leading `www.` label.
#[inline]
pub fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

/// Lowercase, drop surrounding dots and a leading `www.`.
pub fn normalize_domain(host: &str) -> Cow<'_, str> {
    let trimmed = strip_www(host.trim().trim_matches('.'));
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(trimmed.to_ascii_lowercase())
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// `test` equals `base` or is a subdomain of it.
#[inline]
pub fn is_same_origin_host(base: &str, test: &str) -> bool {
    if base.is_empty() || test.len() < base.len() {
        return false;
    }
    let split = test.len() - base.len();
    if !test.as_bytes()[split..].eq_ignore_ascii_case(base.as_bytes()) {
        return false;
    }
    split == 0 || test.as_bytes()[split - 1] == b'.'
}

/// Third-party test for two hosts, tried in both directions.
pub fn is_third_party_host(base_domain: &str, request_host: &str) -> bool {
    let base = normalize_domain(base_domain);
    let req = normalize_domain(request_host);
    !(is_same_origin_host(&base, &req) || is_same_origin_host(&req, &base))
}

/// Whether `request_url` is third-party relative to `base_domain`.
///
/// A URL that cannot be parsed, or has no host, is an error rather than a
/// panic; callers fall back to treating the request as filterable.
pub fn is_third_party(base_domain: &str, request_url: &str) -> Result<bool, OriginError> {
    let parsed = ::url::Url::parse(request_url)?;
    let host = parsed.host_str().ok_or(OriginError::MissingHost)?;
    Ok(is_third_party_host(base_domain, host))
}

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a host and each of its parent domains, most specific first.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk `a.b.c`, `b.c`, `c`.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    let host = host.trim_end_matches('.');
    HostSuffixIter {
        current: if host.is_empty() { None } else { Some(host) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn www_is_equivalent_in_both_directions() {
        assert_eq!(is_third_party("www.example.com", "https://example.com/x"), Ok(false));
        assert_eq!(is_third_party("example.com", "https://www.example.com/x"), Ok(false));
    }

    #[test]
    fn subdomains_are_same_origin_in_both_directions() {
        assert_eq!(is_third_party("example.com", "https://cdn.example.com/a.js"), Ok(false));
        assert_eq!(is_third_party("news.example.com", "https://example.com/a.js"), Ok(false));
    }

    #[test]
    fn sibling_subdomains_are_third_party() {
        // Suffix-aligned only: siblings do not share an origin without a PSL.
        assert_eq!(is_third_party("news.example.com", "https://ads.example.com/"), Ok(true));
    }

    #[test]
    fn label_alignment_is_required() {
        assert_eq!(is_third_party("example.com", "https://badexample.com/"), Ok(true));
        assert_eq!(is_third_party("ads.example.org", "https://ads.example.com/"), Ok(true));
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(is_third_party("Example.COM", "https://WWW.example.com/"), Ok(false));
    }

    #[test]
    fn malformed_urls_are_errors_not_panics() {
        assert!(matches!(
            is_third_party("example.com", "not a url"),
            Err(OriginError::MalformedUrl(_))
        ));
        assert_eq!(
            is_third_party("example.com", "data:text/plain,hello"),
            Err(OriginError::MissingHost)
        );
        assert!(is_third_party("example.com", "").is_err());
    }

    #[test]
    fn normalize_domain_strips_and_lowercases() {
        assert_eq!(normalize_domain("WWW.Example.com."), "example.com");
        assert_eq!(normalize_domain("wwwx.example.com"), "wwwx.example.com");
        assert_eq!(normalize_domain(" example.org "), "example.org");
    }

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn test_walk_host_suffixes() {
        let suffixes: Vec<&str> = walk_host_suffixes("a.b.example.com").collect();
        assert_eq!(suffixes, vec!["a.b.example.com", "b.example.com", "example.com", "com"]);
        assert_eq!(walk_host_suffixes("").count(), 0);
    }
}
