use std::collections::HashSet;

use sieve_core::rule::FilterRule;
use sieve_core::types::RuleFlags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Apply `$badfilter` cancellation, then drop exact duplicates.
///
/// A `$badfilter` rule removes every rule that is identical to it apart from
/// the `badfilter` option, from any list. Duplicates are only collapsed within
/// the same list so per-list diagnostics stay accurate.
pub fn optimize_rules(rules: &mut Vec<FilterRule>) -> OptimizeStats {
    let before = rules.len();
    let mut badfilter_keys: HashSet<RuleKey> = HashSet::new();
    let mut badfilter_rules = 0usize;

    for rule in rules.iter() {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            badfilter_rules += 1;
            badfilter_keys.insert(RuleKey::new(rule, false));
        }
    }

    let mut badfiltered_rules = 0usize;
    rules.retain(|rule| {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            return false;
        }
        if !badfilter_keys.is_empty() && badfilter_keys.contains(&RuleKey::new(rule, false)) {
            badfiltered_rules += 1;
            return false;
        }
        true
    });

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::new(rule, true)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let after = rules.len();

    OptimizeStats {
        before,
        after,
        deduped,
        badfilter_rules,
        badfiltered_rules,
    }
}

/// Everything that affects what a rule matches. Option order in the source
/// line does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    action: u8,
    flags: u16,
    element_types: u16,
    party: u8,
    list_id: Option<u16>,
    pattern_kind: u8,
    pattern: String,
    constraint_include: Vec<u64>,
    constraint_exclude: Vec<u64>,
}

impl RuleKey {
    fn new(rule: &FilterRule, with_list: bool) -> Self {
        let (mut include, mut exclude): (Vec<u64>, Vec<u64>) = match &rule.domains {
            Some(c) => (
                c.include.iter().map(|h| h.to_u64()).collect(),
                c.exclude.iter().map(|h| h.to_u64()).collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        include.sort_unstable();
        exclude.sort_unstable();

        Self {
            action: rule.action as u8,
            flags: (rule.flags - RuleFlags::BADFILTER - RuleFlags::FROM_HOSTS_FILE).bits(),
            element_types: rule.element_types.bits(),
            party: rule.party.bits(),
            list_id: with_list.then_some(rule.list_id),
            pattern_kind: rule.pattern.kind(),
            pattern: if rule.flags.contains(RuleFlags::MATCH_CASE) {
                rule.pattern.source().to_string()
            } else {
                rule.pattern.source().to_ascii_lowercase()
            },
            constraint_include: include,
            constraint_exclude: exclude,
        }
    }
}
