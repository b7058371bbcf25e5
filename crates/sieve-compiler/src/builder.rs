//! Index builder
//!
//! Collects parsed rules from any number of lists, optimizes them, and decides
//! which bucket each rule is filed under.
//!
//! # Key selection
//!
//! - `Host` rules go to the host bucket of their domain.
//! - `Url` rules go to the bucket of one of their safe tokens: the one that is
//!   rarest across all collected rules, longer tokens winning ties.
//! - Rules without a safe token and regex rules go to the fallback bucket.

use std::collections::HashMap;

use sieve_core::hash::{hash_domain, hash_token};
use sieve_core::index::{FilterIndex, IndexKey, IndexStats};
use sieve_core::rule::{FilterRule, RulePattern};

use crate::optimizer::{optimize_rules, OptimizeStats};
use crate::parser::{parse_filter_list, ParseStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub lists: usize,
    pub parse: ParseStats,
    pub optimize: OptimizeStats,
    pub index: IndexStats,
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    rules: Vec<FilterRule>,
    parse: ParseStats,
    next_list_id: u16,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one list and keep its rules. Each call gets a fresh list id.
    pub fn add_list(&mut self, text: &str) -> ParseStats {
        let list_id = self.next_list_id;
        self.next_list_id = self.next_list_id.wrapping_add(1);

        let parsed = parse_filter_list(text, list_id);
        self.parse.merge(&parsed.stats);
        self.rules.extend(parsed.rules);
        parsed.stats
    }

    /// Add rules that were parsed elsewhere.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = FilterRule>) {
        self.rules.extend(rules);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn build(self) -> (FilterIndex, BuildStats) {
        let IndexBuilder {
            mut rules,
            parse,
            next_list_id,
        } = self;

        let optimize = optimize_rules(&mut rules);
        let frequencies = token_frequencies(&rules);

        let index = FilterIndex::new(rules.into_iter().map(|rule| {
            let key = select_key(&rule, &frequencies);
            (rule, key)
        }));

        let stats = BuildStats {
            lists: usize::from(next_list_id),
            parse,
            optimize,
            index: index.stats(),
        };

        log::info!(
            "built filter index: {} rules ({} host, {} token, {} fallback), {} duplicates, {} badfiltered",
            stats.index.rules,
            stats.index.host_rules,
            stats.index.token_rules,
            stats.index.fallback_rules,
            stats.optimize.deduped,
            stats.optimize.badfiltered_rules,
        );

        (index, stats)
    }
}

/// How many rules list each token as safe.
fn token_frequencies(rules: &[FilterRule]) -> HashMap<u32, u32> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for rule in rules {
        if let RulePattern::Url(pattern) = &rule.pattern {
            let mut seen: Vec<u32> = Vec::new();
            for token in pattern.safe_tokens() {
                let hash = hash_token(token);
                if !seen.contains(&hash) {
                    seen.push(hash);
                    *counts.entry(hash).or_insert(0) += 1;
                }
            }
        }
    }
    counts
}

fn select_key(rule: &FilterRule, frequencies: &HashMap<u32, u32>) -> IndexKey {
    match &rule.pattern {
        RulePattern::Host(domain) => IndexKey::Host(hash_domain(domain)),
        RulePattern::Regex(_) => IndexKey::Fallback,
        RulePattern::Url(pattern) => pattern
            .safe_tokens()
            .into_iter()
            .map(|token| {
                let hash = hash_token(token);
                let freq = frequencies.get(&hash).copied().unwrap_or(0);
                (freq, std::cmp::Reverse(token.len()), hash)
            })
            .min()
            .map_or(IndexKey::Fallback, |(_, _, hash)| IndexKey::Token(hash)),
    }
}

/// Parse `text` straight into `builder`.
pub fn parse(text: &str, builder: &mut IndexBuilder) -> ParseStats {
    builder.add_list(text)
}
