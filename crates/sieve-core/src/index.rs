//! In-memory filter index
//!
//! Rules live in one arena; buckets hold `u32` rule ids. A rule is placed in
//! exactly one bucket:
//!
//! - host buckets, keyed by the hash of a `||domain^` rule's domain
//! - token buckets, keyed by the hash of one token the rule's pattern requires
//! - the fallback bucket, scanned for every request
//!
//! Lookups only narrow the candidate set. The matcher verifies every candidate.

use std::collections::HashMap;

use crate::hash::{hash_domain, Hash64};
use crate::origin::walk_host_suffixes;
use crate::rule::FilterRule;
use crate::url::{extract_host, tokenize_url};

/// Which bucket a rule is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    Host(Hash64),
    Token(u32),
    Fallback,
}

/// Bucket counts for logs and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub rules: usize,
    pub exceptions: usize,
    pub host_buckets: usize,
    pub host_rules: usize,
    pub token_buckets: usize,
    pub token_rules: usize,
    pub fallback_rules: usize,
    pub largest_bucket: usize,
}

/// Immutable rule index. Rebuilt wholesale on reload.
#[derive(Debug, Default)]
pub struct FilterIndex {
    rules: Vec<FilterRule>,
    host_buckets: HashMap<Hash64, Vec<u32>>,
    token_buckets: HashMap<u32, Vec<u32>>,
    fallback: Vec<u32>,
}

impl FilterIndex {
    /// An index with no rules; every lookup yields nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from rules and the bucket each one goes to.
    pub fn new(entries: impl IntoIterator<Item = (FilterRule, IndexKey)>) -> Self {
        let mut index = Self::default();

        for (rule, key) in entries {
            let id = index.rules.len() as u32;
            index.rules.push(rule);
            match key {
                IndexKey::Host(hash) => index.host_buckets.entry(hash).or_default().push(id),
                IndexKey::Token(token) => index.token_buckets.entry(token).or_default().push(id),
                IndexKey::Fallback => index.fallback.push(id),
            }
        }

        index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[inline]
    pub fn rule(&self, id: u32) -> Option<&FilterRule> {
        self.rules.get(id as usize)
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Rules that might match `url`: host buckets for every suffix of the
    /// URL host, token buckets for every distinct URL token, then the
    /// fallback bucket. Each rule is yielded at most once.
    pub fn candidate_rules<'a>(&'a self, url: &str) -> impl Iterator<Item = (u32, &'a FilterRule)> + 'a {
        let mut ids: Vec<u32> = Vec::new();

        if let Some(host) = extract_host(url) {
            for suffix in walk_host_suffixes(host) {
                if let Some(bucket) = self.host_buckets.get(&hash_domain(suffix)) {
                    ids.extend_from_slice(bucket);
                }
            }
        }

        if !self.token_buckets.is_empty() {
            for token in tokenize_url(url) {
                if let Some(bucket) = self.token_buckets.get(&token) {
                    ids.extend_from_slice(bucket);
                }
            }
        }

        ids.extend_from_slice(&self.fallback);

        ids.into_iter()
            .filter_map(move |id| self.rule(id).map(|rule| (id, rule)))
    }

    pub fn stats(&self) -> IndexStats {
        let largest = self
            .host_buckets
            .values()
            .chain(self.token_buckets.values())
            .map(Vec::len)
            .chain(std::iter::once(self.fallback.len()))
            .max()
            .unwrap_or(0);

        IndexStats {
            rules: self.rules.len(),
            exceptions: self.rules.iter().filter(|r| r.is_exception()).count(),
            host_buckets: self.host_buckets.len(),
            host_rules: self.host_buckets.values().map(Vec::len).sum(),
            token_buckets: self.token_buckets.len(),
            token_rules: self.token_buckets.values().map(Vec::len).sum(),
            fallback_rules: self.fallback.len(),
            largest_bucket: largest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_token;
    use crate::rule::{AnchorType, RulePattern, UrlPattern};
    use crate::types::RuleAction;

    fn host_entry(domain: &str) -> (FilterRule, IndexKey) {
        (
            FilterRule::new(RuleAction::Block, RulePattern::Host(domain.to_string())),
            IndexKey::Host(hash_domain(domain)),
        )
    }

    fn url_entry(body: &str, key: IndexKey) -> (FilterRule, IndexKey) {
        let pattern = UrlPattern::compile(body, AnchorType::None, false, false);
        (FilterRule::new(RuleAction::Block, RulePattern::Url(pattern)), key)
    }

    fn candidate_ids(index: &FilterIndex, url: &str) -> Vec<u32> {
        index.candidate_rules(url).map(|(id, _)| id).collect()
    }

    #[test]
    fn host_buckets_are_found_through_suffixes() {
        let index = FilterIndex::new(vec![host_entry("example.com"), host_entry("other.org")]);
        assert_eq!(candidate_ids(&index, "https://ads.example.com/x.js"), vec![0]);
        assert_eq!(candidate_ids(&index, "https://EXAMPLE.com/"), vec![0]);
        assert!(candidate_ids(&index, "https://example.net/").is_empty());
    }

    #[test]
    fn token_buckets_use_any_url_token() {
        let index = FilterIndex::new(vec![url_entry(
            "/banner/",
            IndexKey::Token(hash_token("banner")),
        )]);
        assert_eq!(candidate_ids(&index, "https://cdn.site.com/img/Banner/1.png"), vec![0]);
        assert!(candidate_ids(&index, "https://cdn.site.com/img/1.png").is_empty());
    }

    #[test]
    fn fallback_is_always_a_candidate() {
        let index = FilterIndex::new(vec![url_entry("*", IndexKey::Fallback)]);
        assert_eq!(candidate_ids(&index, "https://a.com/"), vec![0]);
        assert_eq!(candidate_ids(&index, "not a url"), vec![0]);
    }

    #[test]
    fn each_rule_is_yielded_once() {
        let index = FilterIndex::new(vec![
            host_entry("example.com"),
            url_entry("/ads/", IndexKey::Token(hash_token("ads"))),
            url_entry("*", IndexKey::Fallback),
        ]);
        let ids = candidate_ids(&index, "https://ads.example.com/ads/ads.js");
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn stats_count_buckets() {
        let index = FilterIndex::new(vec![
            host_entry("a.com"),
            host_entry("b.com"),
            url_entry("/ads/", IndexKey::Token(hash_token("ads"))),
            url_entry("*", IndexKey::Fallback),
        ]);
        let stats = index.stats();
        assert_eq!(stats.rules, 4);
        assert_eq!(stats.host_buckets, 2);
        assert_eq!(stats.token_rules, 1);
        assert_eq!(stats.fallback_rules, 1);
        assert_eq!(stats.largest_bucket, 1);
        assert!(FilterIndex::empty().is_empty());
    }
}
