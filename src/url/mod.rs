//! URL handling module for tagwalk
//!
//! This module decides whether a discovered link may be visited: the
//! admission filter rejects unparseable URLs, foreign authorities when
//! the walk is domain-locked, binary/document downloads, non-navigable
//! schemes and fragments, and anything the exclusion pattern engine
//! denies.

mod exclusion;

pub use exclusion::{glob_match, ExclusionEngine};

use url::Url;

/// File extensions that are never worth visiting
const SKIPPED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".zip", ".rar", ".exe",
];

/// Substrings marking a URL as non-navigable
const NON_NAVIGABLE: &[&str] = &["mailto:", "tel:", "javascript:", "#"];

/// Decides whether a discovered link may be visited
#[derive(Debug)]
pub struct AdmissionFilter {
    base_authority: String,
    domain_locked: bool,
    exclusions: ExclusionEngine,
}

impl AdmissionFilter {
    /// Creates a filter anchored to the start URL's authority
    pub fn new(start_url: &Url, domain_locked: bool, exclusions: ExclusionEngine) -> Self {
        Self {
            base_authority: authority_of(start_url),
            domain_locked,
            exclusions,
        }
    }

    /// Returns the authority the filter is locked to
    pub fn base_authority(&self) -> &str {
        &self.base_authority
    }

    /// Returns true if the URL may enter the candidate set
    ///
    /// All checks are pure; only the exclusion engine emits diagnostic
    /// events on match.
    pub fn is_admissible(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        // A URL without an authority (mailto:, data:, ...) is not a page
        if parsed.host_str().is_none() {
            return false;
        }

        if self.domain_locked && authority_of(&parsed) != self.base_authority {
            return false;
        }

        let path = parsed.path().to_lowercase();
        if SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }

        let url_lower = url.to_lowercase();
        if NON_NAVIGABLE.iter().any(|kw| url_lower.contains(kw)) {
            return false;
        }

        !self.exclusions.is_excluded(url)
    }
}

/// Returns the host[:port] authority of a URL
pub fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
