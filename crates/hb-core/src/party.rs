//! First-party / third-party classification
//!
//! A request is third-party when its base domain differs from the base
//! domain of the top-level document that triggered it.

use std::sync::Arc;

use log::{debug, warn};

use crate::psl::SuffixResolver;
use crate::url::{extract_scheme, origin_of};

/// Internal and non-network schemes. Requests using them are never evaluated.
pub const WHITELISTED_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "file",
    "irc",
    "moz-safe-about",
    "news",
    "resource",
    "snews",
    "x-jsd",
    "addbook",
    "cid",
    "imap",
    "mailbox",
    "nntp",
    "pop",
    "data",
    "javascript",
    "moz-icon",
    "moz-extension",
    "chrome-extension",
    "blob",
    "view-source",
];

/// Check a scheme, or the scheme of a full URL, against [`WHITELISTED_SCHEMES`].
pub fn is_whitelisted_scheme(scheme_or_url: &str) -> bool {
    let scheme = extract_scheme(scheme_or_url).unwrap_or(scheme_or_url);
    WHITELISTED_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
}

/// Party classification over an injected suffix resolver.
#[derive(Clone)]
pub struct PartyClassifier {
    suffixes: Arc<dyn SuffixResolver>,
}

impl PartyClassifier {
    pub fn new(suffixes: Arc<dyn SuffixResolver>) -> Self {
        Self { suffixes }
    }

    /// Base domain of a URL's host. `None` means the URL should be ignored.
    pub fn base_domain(&self, url: &str) -> Option<String> {
        let origin = origin_of(url)?;
        self.suffixes.base_domain(&origin)
    }

    /// Base domain of a bare origin.
    pub fn base_domain_of_origin(&self, origin: &str) -> Option<String> {
        self.suffixes.base_domain(origin)
    }

    /// Returns `false` (and logs) if either URL has no usable host.
    pub fn is_third_party(&self, request_url: &str, top_document_url: &str) -> bool {
        let Some(req_origin) = origin_of(request_url) else {
            warn!("Cannot classify request, unparseable URL '{}'", request_url);
            return false;
        };
        let Some(top_origin) = origin_of(top_document_url) else {
            warn!("Cannot classify request, unparseable top document '{}'", top_document_url);
            return false;
        };

        if req_origin == top_origin {
            return false;
        }

        match (
            self.suffixes.base_domain(&req_origin),
            self.suffixes.base_domain(&top_origin),
        ) {
            (Some(req_base), Some(top_base)) => req_base != top_base,
            _ => {
                debug!(
                    "No base domain for '{}' or '{}', comparing hosts",
                    req_origin, top_origin
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psl::SuffixList;

    fn classifier() -> PartyClassifier {
        PartyClassifier::new(Arc::new(SuffixList::fallback()))
    }

    #[test]
    fn test_whitelisted_schemes() {
        assert!(is_whitelisted_scheme("about"));
        assert!(is_whitelisted_scheme("DATA"));
        assert!(is_whitelisted_scheme("javascript:void(0)"));
        assert!(is_whitelisted_scheme("moz-extension://abc/popup.html"));
        assert!(!is_whitelisted_scheme("https"));
        assert!(!is_whitelisted_scheme("https://example.com/"));
        assert!(!is_whitelisted_scheme("wss://example.com/"));
    }

    #[test]
    fn test_third_party() {
        let party = classifier();
        assert!(party.is_third_party("https://cdn.tracker.com/x.js", "https://site.com/"));
        assert!(!party.is_third_party("https://static.site.com/app.js", "https://www.site.com/"));
        assert!(!party.is_third_party("https://site.com/app.js", "https://site.com/"));
        assert!(party.is_third_party("https://a.co.uk/", "https://b.co.uk/"));
    }

    #[test]
    fn test_third_party_unparseable_is_false() {
        let party = classifier();
        assert!(!party.is_third_party("garbage", "https://site.com/"));
        assert!(!party.is_third_party("https://cdn.tracker.com/x.js", "about:blank"));
    }

    #[test]
    fn test_base_domain() {
        let party = classifier();
        assert_eq!(party.base_domain("https://ads.example.com/p").as_deref(), Some("example.com"));
        assert_eq!(party.base_domain("data:text/plain,x"), None);
    }
}
