//! Public Suffix List (PSL) utilities for base domain extraction
//!
//! This module provides eTLD+1 extraction with LRU caching. PSL data is
//! parsed with the `publicsuffix` crate when available; without it a small
//! heuristic covering common two-part suffixes is used.
//!
//! # Examples
//!
//! ```
//! use hb_core::psl::{SuffixList, SuffixResolver};
//!
//! let psl = SuffixList::fallback();
//! assert_eq!(psl.base_domain("sub.example.com").as_deref(), Some("example.com"));
//! assert_eq!(psl.base_domain("sub.example.co.uk").as_deref(), Some("example.co.uk"));
//! ```

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;

use log::debug;
use parking_lot::Mutex;
use publicsuffix::{List, Psl};

use crate::url::normalize_host;

/// Error type for PSL loading.
#[derive(Debug, thiserror::Error)]
pub enum PslError {
    #[error("Failed to parse public suffix list: {0}")]
    Parse(String),
}

/// Resolves an origin to its registrable base domain.
pub trait SuffixResolver: Send + Sync {
    /// Base domain of `host`, or `None` if it has none (empty or malformed).
    fn base_domain(&self, host: &str) -> Option<String>;
}

// =============================================================================
// LRU Cache
// =============================================================================

/// Simple fixed-size cache for eTLD+1 lookups.
///
/// Recency is tracked with a tick per entry. A hit appends a new
/// `(tick, key)` to the order queue instead of searching it, and entries in
/// the queue whose tick no longer matches are skipped on eviction. The queue
/// is compacted once it holds twice the capacity.
pub struct LruCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (String, u64)>,
    order: VecDeque<(u64, String)>,
}

impl LruCache {
    /// Create a new LRU cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Get a value from the cache.
    pub fn get(&mut self, key: &str) -> Option<&str> {
        let tick = self.tick + 1;
        let entry = self.entries.get_mut(key)?;
        entry.1 = tick;
        self.tick = tick;
        self.touch(tick, key);
        self.entries.get(key).map(|(value, _)| value.as_str())
    }

    /// Insert a value into the cache.
    pub fn insert(&mut self, key: String, value: String) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.tick += 1;
        let tick = self.tick;
        self.touch(tick, &key);
        self.entries.insert(key, (value, tick));
    }

    fn touch(&mut self, tick: u64, key: &str) {
        // Already most recent: no new queue slot needed
        if let Some(back) = self.order.back_mut() {
            if back.1 == key {
                back.0 = tick;
                return;
            }
        }
        self.order.push_back((tick, key.to_string()));
        if self.order.len() > self.capacity * 2 {
            let entries = &self.entries;
            self.order
                .retain(|(t, k)| k == key || entries.get(k).is_some_and(|(_, current)| current == t));
        }
    }

    fn evict_oldest(&mut self) {
        while let Some((tick, key)) = self.order.pop_front() {
            if self.entries.get(&key).is_some_and(|(_, current)| *current == tick) {
                self.entries.remove(&key);
                return;
            }
        }
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.order.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.tick = 0;
    }
}

// =============================================================================
// Suffix List
// =============================================================================

const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Common two-part TLDs for fallback.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Base domain lookup backed by an optional parsed PSL.
pub struct SuffixList {
    list: Option<List>,
    cache: Mutex<LruCache>,
}

impl SuffixList {
    /// Heuristic-only resolver (no PSL data loaded).
    pub fn fallback() -> Self {
        Self {
            list: None,
            cache: Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    /// Parse PSL text (the `public_suffix_list.dat` format).
    pub fn from_psl_text(text: &str) -> Result<Self, PslError> {
        let list = text
            .parse::<List>()
            .map_err(|e| PslError::Parse(e.to_string()))?;
        Ok(Self {
            list: Some(list),
            cache: Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
        })
    }

    /// Check if PSL data is loaded.
    pub fn has_list(&self) -> bool {
        self.list.is_some()
    }

    /// Drop all memoized lookups.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn compute(&self, host: &str) -> String {
        if let Some(list) = &self.list {
            if let Some(domain) = list.domain(host.as_bytes()) {
                if let Ok(domain) = std::str::from_utf8(domain.as_bytes()) {
                    return domain.to_string();
                }
            }
            debug!("PSL has no registrable domain for '{}', using fallback", host);
        }

        let labels: Vec<&str> = host.split('.').collect();
        fallback_etld1(&labels)
    }
}

impl Default for SuffixList {
    fn default() -> Self {
        Self::fallback()
    }
}

impl SuffixResolver for SuffixList {
    fn base_domain(&self, host: &str) -> Option<String> {
        let host = normalize_host(host);
        if host.is_empty() || host.split('.').any(str::is_empty) {
            return None;
        }

        // IP literals have no suffix
        if is_ip_literal(&host) {
            return Some(host);
        }

        if let Some(cached) = self.cache.lock().get(&host) {
            return Some(cached.to_string());
        }

        let result = self.compute(&host);
        self.cache.lock().insert(host, result.clone());
        Some(result)
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.starts_with('[') || host.parse::<IpAddr>().is_ok()
}

/// Fallback eTLD+1 heuristic.
fn fallback_etld1(labels: &[&str]) -> String {
    let n = labels.len();
    if n <= 2 {
        return labels.join(".");
    }

    // Check for common two-part TLDs
    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        return labels[n - 3..].join(".");
    }

    // Default: last 2 labels
    labels[n - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI_PSL: &str = "\
// ===BEGIN ICANN DOMAINS===
com
uk
co.uk
*.ck
!www.ck
// ===END ICANN DOMAINS===
// ===BEGIN PRIVATE DOMAINS===
github.io
// ===END PRIVATE DOMAINS===
";

    #[test]
    fn test_fallback_etld1_simple() {
        assert_eq!(fallback_etld1(&["example", "com"]), "example.com");
        assert_eq!(fallback_etld1(&["sub", "example", "com"]), "example.com");
    }

    #[test]
    fn test_fallback_etld1_two_part() {
        assert_eq!(fallback_etld1(&["sub", "example", "co", "uk"]), "example.co.uk");
        assert_eq!(fallback_etld1(&["example", "co", "uk"]), "example.co.uk");
    }

    #[test]
    fn test_base_domain_rejects_malformed() {
        let psl = SuffixList::fallback();
        assert_eq!(psl.base_domain(""), None);
        assert_eq!(psl.base_domain("a..b.com"), None);
        assert_eq!(psl.base_domain("192.168.1.10").as_deref(), Some("192.168.1.10"));
    }

    #[test]
    fn test_base_domain_is_cached() {
        let psl = SuffixList::fallback();
        assert_eq!(psl.base_domain("ADS.Example.com").as_deref(), Some("example.com"));
        assert_eq!(psl.cache.lock().len(), 1);
        assert_eq!(psl.base_domain("ads.example.com").as_deref(), Some("example.com"));
        assert_eq!(psl.cache.lock().len(), 1);
    }

    #[test]
    fn test_loaded_list() {
        let psl = SuffixList::from_psl_text(MINI_PSL).unwrap();
        assert!(psl.has_list());
        assert_eq!(psl.base_domain("a.b.example.co.uk").as_deref(), Some("example.co.uk"));
        assert_eq!(psl.base_domain("cdn.tracker.com").as_deref(), Some("tracker.com"));
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let mut cache = LruCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        assert_eq!(cache.get("a"), Some("1"));
        cache.insert("c".into(), "3".into());
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1"));
        assert_eq!(cache.get("c"), Some("3"));
    }

    #[test]
    fn test_lru_repeated_hits_stay_bounded() {
        let mut cache = LruCache::new(4);
        for key in ["a", "b", "c", "d"] {
            cache.insert(key.into(), key.to_uppercase());
        }
        for _ in 0..1000 {
            assert_eq!(cache.get("d"), Some("D"));
        }
        assert_eq!(cache.queued(), 4);

        for i in 0..1000 {
            let key = if i % 2 == 0 { "a" } else { "b" };
            assert!(cache.get(key).is_some());
        }
        assert!(cache.queued() <= 8 + 1);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_lru_recency_survives_compaction() {
        let mut cache = LruCache::new(3);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("c".into(), "3".into());
        for _ in 0..20 {
            cache.get("a");
            cache.get("c");
        }
        // b is least recently used
        cache.insert("d".into(), "4".into());
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1"));
        assert_eq!(cache.get("c"), Some("3"));
        assert_eq!(cache.get("d"), Some("4"));
    }
}
