//! Core Matching Engine
//!
//! This is the hot path - every filtered request goes through here.
//! Candidates come from the index; each one is verified against the request.
//! A matching exception ends evaluation immediately; a matching block rule is
//! only reported once no exception turned up.

use std::borrow::Cow;

use crate::hash::{hash_domain, Hash64};
use crate::index::FilterIndex;
use crate::origin::{is_same_origin_host, is_third_party, walk_host_suffixes};
use crate::rule::{AnchorType, DomainConstraint, FilterRule, PatternOp, RulePattern, UrlPattern};
use crate::types::{ElementTypes, RuleFlags};
use crate::url::{get_host_position, is_separator_char};

// =============================================================================
// Request Context
// =============================================================================

/// Caller-facing match options.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions<'a> {
    /// Domain of the document that issued the request
    pub domain: Option<&'a str>,
    pub element_type: ElementTypes,
}

/// Per-request values computed once and shared by every candidate check.
#[derive(Debug, Clone)]
pub struct MatchContext<'a> {
    pub url: &'a str,
    url_lower: Cow<'a, str>,
    host_pos: Option<(usize, usize)>,
    pub initiating_domain: Option<&'a str>,
    pub element_type: ElementTypes,
    /// Unknown initiators and unparseable URLs count as third-party.
    pub is_third_party: bool,
}

impl<'a> MatchContext<'a> {
    pub fn new(url: &'a str, initiating_domain: Option<&'a str>, element_type: ElementTypes) -> Self {
        let is_third_party = match initiating_domain {
            Some(domain) => is_third_party(domain, url).unwrap_or(true),
            None => true,
        };
        Self::with_party(url, initiating_domain, element_type, is_third_party)
    }

    /// Build a context when the caller already classified the request.
    pub fn with_party(
        url: &'a str,
        initiating_domain: Option<&'a str>,
        element_type: ElementTypes,
        is_third_party: bool,
    ) -> Self {
        let url_lower = if url.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(url.to_ascii_lowercase())
        } else {
            Cow::Borrowed(url)
        };

        Self {
            url,
            url_lower,
            host_pos: get_host_position(url)
                // `example.com.` is the same host as `example.com`
                .map(|(start, end)| {
                    if end > start && url.as_bytes()[end - 1] == b'.' {
                        (start, end - 1)
                    } else {
                        (start, end)
                    }
                })
                .filter(|(start, end)| end > start),
            initiating_domain,
            element_type: if element_type.is_empty() {
                ElementTypes::OTHER
            } else {
                element_type
            },
            is_third_party,
        }
    }

    #[inline]
    fn host(&self) -> Option<&str> {
        self.host_pos.map(|(start, end)| &self.url[start..end])
    }
}

/// Result of evaluating a request, with the rules that decided it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub blocked: bool,
    /// A block rule that matched. When an exception allowed the request this
    /// is only set if the block rule was checked before the exception.
    pub rule_id: Option<u32>,
    /// The exception rule that allowed the request
    pub exception_id: Option<u32>,
}

// =============================================================================
// Matcher
// =============================================================================

/// Evaluates requests against one index snapshot.
pub struct Matcher<'a> {
    index: &'a FilterIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a FilterIndex) -> Self {
        Self { index }
    }

    /// Whether `url` should be blocked.
    pub fn matches(&self, url: &str, options: &MatchOptions<'_>) -> bool {
        let ctx = MatchContext::new(url, options.domain, options.element_type);
        self.match_request(&ctx).blocked
    }

    /// Evaluate a request and report which rules decided it.
    pub fn match_request(&self, ctx: &MatchContext<'_>) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for (id, rule) in self.index.candidate_rules(ctx.url) {
            if rule.flags.contains(RuleFlags::BADFILTER) {
                continue;
            }
            if rule.is_exception() {
                if rule_applies(rule, ctx) {
                    outcome.exception_id = Some(id);
                    outcome.blocked = false;
                    return outcome;
                }
            } else if outcome.rule_id.is_none() && rule_applies(rule, ctx) {
                outcome.rule_id = Some(id);
                outcome.blocked = true;
            }
        }

        outcome
    }
}

/// Whether `url` should be blocked according to `index`.
pub fn matches(index: &FilterIndex, url: &str, options: &MatchOptions<'_>) -> bool {
    Matcher::new(index).matches(url, options)
}

// =============================================================================
// Candidate Verification
// =============================================================================

fn rule_applies(rule: &FilterRule, ctx: &MatchContext<'_>) -> bool {
    // Cheap option checks first
    if !rule.element_types.intersects(ctx.element_type) {
        return false;
    }
    if !rule.party.admits(ctx.is_third_party) {
        return false;
    }
    if let Some(constraint) = &rule.domains {
        if !check_domain_constraints(constraint, ctx.initiating_domain) {
            return false;
        }
    }

    match &rule.pattern {
        RulePattern::Host(domain) => ctx.host().is_some_and(|host| is_same_origin_host(domain, host)),
        RulePattern::Url(pattern) => verify_url_pattern(pattern, ctx),
        RulePattern::Regex(re) => re.is_match(ctx.url),
    }
}

/// Check `domain=` constraints against the initiating domain.
/// An include list cannot be satisfied without an initiating domain.
fn check_domain_constraints(constraint: &DomainConstraint, domain: Option<&str>) -> bool {
    let Some(domain) = domain else {
        return constraint.include.is_empty();
    };

    let listed = |list: &[Hash64]| walk_host_suffixes(domain).any(|suffix| list.contains(&hash_domain(suffix)));

    if !constraint.include.is_empty() && !listed(constraint.include.as_slice()) {
        return false;
    }
    if !constraint.exclude.is_empty() && listed(constraint.exclude.as_slice()) {
        return false;
    }

    true
}

/// Verify a URL against a compiled pattern.
fn verify_url_pattern(pattern: &UrlPattern, ctx: &MatchContext<'_>) -> bool {
    let haystack = if pattern.match_case {
        ctx.url.as_bytes()
    } else {
        ctx.url_lower.as_bytes()
    };
    let ops = pattern.ops.as_slice();
    let right = pattern.right_anchor;

    match pattern.anchor {
        AnchorType::Left => match_ops(ops, haystack, 0, false, right),
        AnchorType::Hostname => {
            let Some((host_start, host_end)) = ctx.host_pos else {
                return false;
            };
            // Host start, or just after any label dot inside the host
            std::iter::once(host_start)
                .chain((host_start..host_end).filter(|&i| haystack[i] == b'.').map(|i| i + 1))
                .any(|start| match_ops(ops, haystack, start, false, right))
        }
        AnchorType::None => match_ops(ops, haystack, 0, true, right),
    }
}

/// Match pattern ops against `haystack` from `pos`.
///
/// Wildcards split the ops into segments. The first segment is pinned to
/// `pos` unless `floating`; every later segment is taken at its leftmost
/// occurrence after the previous one. Segments have a fixed width, so the
/// leftmost occurrence never rules out a match and nothing backtracks.
fn match_ops(ops: &[PatternOp], haystack: &[u8], pos: usize, floating: bool, right_anchor: bool) -> bool {
    let mut segments = ops.split(|op| matches!(op, PatternOp::Wildcard)).enumerate().peekable();
    let mut cursor = pos;

    while let Some((i, segment)) = segments.next() {
        let pinned = i == 0 && !floating;
        let last_start = if pinned { cursor } else { haystack.len() };
        let mut starts = cursor..=last_start;

        if segments.peek().is_none() && right_anchor {
            // A trailing wildcard leaves an empty last segment, which can
            // always sit at the end
            return starts.any(|start| match_segment(segment, haystack, start) == Some(haystack.len()));
        }

        match starts.find_map(|start| match_segment(segment, haystack, start)) {
            Some(end) => cursor = end,
            None => return false,
        }
    }

    true
}

/// Match one wildcard-free run of ops at exactly `pos`, returning where it ends.
fn match_segment(segment: &[PatternOp], haystack: &[u8], mut pos: usize) -> Option<usize> {
    for op in segment {
        match op {
            PatternOp::Literal(lit) => {
                let lit = lit.as_bytes();
                if !haystack[pos..].starts_with(lit) {
                    return None;
                }
                pos += lit.len();
            }
            // `^` also matches the end of the URL
            PatternOp::Separator => {
                if pos < haystack.len() {
                    if !is_separator_char(haystack[pos]) {
                        return None;
                    }
                    pos += 1;
                }
            }
            PatternOp::Wildcard => {}
        }
    }
    Some(pos)
}
