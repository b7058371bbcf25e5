//! Filter-list parser
//!
//! Turns Adblock-Plus style filter lines into [`FilterRule`]s. Every line is
//! parsed on its own: a line that cannot be used is reported as a
//! [`ParseError`] and skipped by [`parse_filter_list`], never aborting the
//! rest of the list.

use std::net::IpAddr;

use sieve_core::hash::hash_domain;
use sieve_core::rule::{AnchorType, DomainConstraint, FilterRule, RulePattern, UrlPattern};
use sieve_core::types::{ElementTypes, PartyMask, RuleAction, RuleFlags};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty rule")]
    Empty,
    #[error("unsupported modifier `{0}`")]
    UnsupportedModifier(String),
    #[error("options leave no request this rule could apply to")]
    EmptyTypeMask,
    #[error("invalid domain `{0}`")]
    InvalidDomain(String),
    #[error("invalid regex: {0}")]
    InvalidRegex(String),
    #[error("rule has no pattern")]
    EmptyPattern,
}

/// Per-list parse counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub rules: usize,
    pub exceptions: usize,
    /// Blank, comment and cosmetic lines
    pub ignored: usize,
    /// Lines rejected with a [`ParseError`]
    pub errors: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: &ParseStats) {
        self.lines += other.lines;
        self.rules += other.rules;
        self.exceptions += other.exceptions;
        self.ignored += other.ignored;
        self.errors += other.errors;
    }
}

#[derive(Debug, Default)]
pub struct ParsedList {
    pub rules: Vec<FilterRule>,
    pub stats: ParseStats,
}

/// Options that change what a matching rule does. Dropping them would turn
/// the rule into a plain block, so such rules are rejected instead.
const UNSUPPORTED_MODIFIERS: &[&str] = &[
    "csp",
    "removeparam",
    "queryprune",
    "redirect-rule",
    "rewrite",
    "replace",
    "header",
    "removeheader",
    "permissions",
    "urltransform",
    "elemhide",
    "ehide",
    "generichide",
    "ghide",
    "specifichide",
    "shide",
    "genericblock",
];

/// Host names a hosts file maps to itself; never turned into rules.
const HOSTS_FILE_SELF: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
    "0.0.0.0",
];

/// Parse a whole list, skipping lines that fail.
pub fn parse_filter_list(text: &str, list_id: u16) -> ParsedList {
    let mut parsed = ParsedList::default();

    for (line_no, line) in text.lines().enumerate() {
        parsed.stats.lines += 1;
        match parse_filter_line(line) {
            Ok(Some(mut rule)) => {
                rule.list_id = list_id;
                if rule.is_exception() {
                    parsed.stats.exceptions += 1;
                }
                parsed.stats.rules += 1;
                parsed.rules.push(rule);
            }
            Ok(None) => parsed.stats.ignored += 1,
            Err(err) => {
                parsed.stats.errors += 1;
                log::debug!("list {list_id} line {}: skipping `{}`: {err}", line_no + 1, line.trim());
            }
        }
    }

    parsed
}

/// Parse one filter line.
///
/// `Ok(None)` for blank, comment and cosmetic lines.
pub fn parse_filter_line(raw_line: &str) -> Result<Option<FilterRule>, ParseError> {
    let line = raw_line.trim();
    if line.is_empty() || is_comment_line(line) || is_cosmetic_line(line) {
        return Ok(None);
    }

    if let Some(hosts_entry) = parse_hosts_file_line(line) {
        let Some(domain) = hosts_entry else {
            return Ok(None);
        };
        let mut rule = FilterRule::new(RuleAction::Block, RulePattern::Host(domain));
        rule.flags |= RuleFlags::FROM_HOSTS_FILE;
        rule.raw = line.to_string();
        return Ok(Some(rule));
    }

    let (action, body) = match line.strip_prefix("@@") {
        Some(rest) => (RuleAction::Allow, rest.trim_start()),
        None => (RuleAction::Block, line),
    };
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let (pattern_part, options_text) = split_rule_options(body);
    let options = match options_text {
        Some(text) => parse_options(text)?,
        None => ParsedOptions::default(),
    };

    let (pattern, pattern_flags) = parse_pattern(pattern_part.trim(), options.flags)?;

    Ok(Some(FilterRule {
        action,
        flags: options.flags | pattern_flags,
        pattern,
        element_types: options.element_types,
        party: options.party,
        domains: options.domains,
        list_id: 0,
        raw: line.to_string(),
    }))
}

// =============================================================================
// Line Classification
// =============================================================================

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || (line.starts_with('#') && !line.starts_with("##"))
}

fn is_cosmetic_line(line: &str) -> bool {
    const MARKERS: &[&str] = &["##", "#@#", "#?#", "#$#", "#@$#", "#%#", "#@%#", "#@?#"];
    MARKERS.iter().any(|marker| line.contains(marker))
}

/// `Some(Some(domain))` for a usable hosts-file entry, `Some(None)` for an
/// entry that maps a local name, `None` if the line is not a hosts entry.
fn parse_hosts_file_line(line: &str) -> Option<Option<String>> {
    let entry = line.split('#').next().unwrap_or(line);
    let mut parts = entry.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    first.parse::<IpAddr>().ok()?;

    let domain = normalize_domain(second)?;
    if HOSTS_FILE_SELF.contains(&domain.as_str()) {
        return Some(None);
    }
    Some(Some(domain))
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone)]
struct ParsedOptions {
    flags: RuleFlags,
    element_types: ElementTypes,
    party: PartyMask,
    domains: Option<DomainConstraint>,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            flags: RuleFlags::empty(),
            element_types: ElementTypes::DEFAULT,
            party: PartyMask::empty(),
            domains: None,
        }
    }
}

/// Split at the last `$` that starts an option list. A `$` inside a regex or a
/// URL path is left in the pattern.
fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    // Regex rules keep every `$` up to their closing slash
    let floor = if line.starts_with('/') {
        line.rfind('/').unwrap_or(0)
    } else {
        0
    };

    let mut search_end = line.len();
    while let Some(pos) = line[..search_end].rfind('$') {
        if pos < floor {
            break;
        }
        let rest = &line[pos + 1..];
        if rest
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'~' || b == b'_')
        {
            return (&line[..pos], Some(rest));
        }
        search_end = pos;
    }

    (line, None)
}

fn parse_options(text: &str) -> Result<ParsedOptions, ParseError> {
    let mut flags = RuleFlags::empty();
    let mut type_include = ElementTypes::empty();
    let mut type_exclude = ElementTypes::empty();
    let mut party_include = PartyMask::empty();
    let mut party_exclude = PartyMask::empty();
    let mut domains: Option<DomainConstraint> = None;

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let (negated, option) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower.as_str()),
        };
        let (name, value) = match option.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (option, None),
        };

        if UNSUPPORTED_MODIFIERS.contains(&name) {
            return Err(ParseError::UnsupportedModifier(name.to_string()));
        }

        match (name, value) {
            ("match-case" | "match_case", None) => flags |= RuleFlags::MATCH_CASE,
            ("badfilter", None) => flags |= RuleFlags::BADFILTER,
            ("domain" | "from", Some(value)) => {
                let parsed = parse_domain_option(value)?;
                domains = Some(merge_constraints(domains, parsed));
            }
            // Surrogate resources are not served; the rule still blocks
            ("redirect", _) | ("important", None) => {}
            (name, None) => {
                if let Some(mask) = ElementTypes::from_option(name) {
                    if negated {
                        type_exclude |= mask;
                    } else {
                        type_include |= mask;
                    }
                } else if let Some(mask) = party_option(name) {
                    if negated {
                        party_exclude |= mask;
                    } else {
                        party_include |= mask;
                    }
                } else {
                    log::trace!("ignoring unknown option `{raw}`");
                }
            }
            _ => log::trace!("ignoring unknown option `{raw}`"),
        }
    }

    let element_types = finalize_type_mask(type_include, type_exclude)?;
    let party = finalize_party_mask(party_include, party_exclude)?;

    Ok(ParsedOptions {
        flags,
        element_types,
        party,
        domains,
    })
}

fn party_option(name: &str) -> Option<PartyMask> {
    match name {
        "third-party" | "thirdparty" | "3p" => Some(PartyMask::THIRD_PARTY),
        "first-party" | "firstparty" | "1p" => Some(PartyMask::FIRST_PARTY),
        _ => None,
    }
}

fn finalize_type_mask(include: ElementTypes, exclude: ElementTypes) -> Result<ElementTypes, ParseError> {
    let mask = if include.is_empty() {
        ElementTypes::DEFAULT - exclude
    } else {
        include - exclude
    };
    if mask.is_empty() {
        return Err(ParseError::EmptyTypeMask);
    }
    Ok(mask)
}

fn finalize_party_mask(include: PartyMask, exclude: PartyMask) -> Result<PartyMask, ParseError> {
    let mask = if include.is_empty() {
        PartyMask::ALL - exclude
    } else {
        include - exclude
    };
    if mask.is_empty() {
        return Err(ParseError::EmptyTypeMask);
    }
    // Both parties is the same as no restriction
    if mask == PartyMask::ALL {
        return Ok(PartyMask::empty());
    }
    Ok(mask)
}

fn merge_constraints(existing: Option<DomainConstraint>, incoming: DomainConstraint) -> DomainConstraint {
    match existing {
        Some(mut current) => {
            current.include.extend(incoming.include);
            current.exclude.extend(incoming.exclude);
            current
        }
        None => incoming,
    }
}

fn parse_domain_option(value: &str) -> Result<DomainConstraint, ParseError> {
    let mut constraint = DomainConstraint::default();

    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let domain =
            normalize_domain(domain_raw).ok_or_else(|| ParseError::InvalidDomain(domain_raw.to_string()))?;
        let hash = hash_domain(&domain);

        if is_exclude {
            constraint.exclude.push(hash);
        } else {
            constraint.include.push(hash);
        }
    }

    if constraint.is_empty() {
        return Err(ParseError::InvalidDomain(value.to_string()));
    }

    Ok(constraint)
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b == b'_')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

// =============================================================================
// Patterns
// =============================================================================

fn parse_pattern(text: &str, option_flags: RuleFlags) -> Result<(RulePattern, RuleFlags), ParseError> {
    if text.is_empty() {
        return Err(ParseError::EmptyPattern);
    }
    let match_case = option_flags.contains(RuleFlags::MATCH_CASE);

    if text.len() > 2 && text.starts_with('/') && text.ends_with('/') {
        let body = &text[1..text.len() - 1];
        let re = regex::RegexBuilder::new(body)
            .case_insensitive(!match_case)
            .build()
            .map_err(|err| ParseError::InvalidRegex(err.to_string()))?;
        return Ok((RulePattern::Regex(re), RuleFlags::empty()));
    }

    if let Some(domain) = parse_host_anchor_rule(text) {
        return Ok((RulePattern::Host(domain), RuleFlags::HAS_HOST_ANCHOR));
    }

    let mut flags = RuleFlags::empty();
    let (anchor, rest) = if let Some(rest) = text.strip_prefix("||") {
        flags |= RuleFlags::HAS_HOST_ANCHOR;
        (AnchorType::Hostname, rest.strip_prefix('.').unwrap_or(rest))
    } else if let Some(rest) = text.strip_prefix('|') {
        flags |= RuleFlags::HAS_LEFT_ANCHOR;
        (AnchorType::Left, rest)
    } else {
        (AnchorType::None, text)
    };

    let body = match rest.strip_suffix('|') {
        Some(body) => {
            flags |= RuleFlags::HAS_RIGHT_ANCHOR;
            body
        }
        None => rest,
    };

    if body.is_empty() {
        return Err(ParseError::EmptyPattern);
    }

    let pattern = UrlPattern::compile(
        body,
        anchor,
        flags.contains(RuleFlags::HAS_RIGHT_ANCHOR),
        match_case,
    );
    Ok((RulePattern::Url(pattern), flags))
}

/// `||domain^` with nothing else: a pure host rule.
fn parse_host_anchor_rule(text: &str) -> Option<String> {
    let rest = text.strip_prefix("||")?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let host = rest
        .strip_suffix("^|")
        .or_else(|| rest.strip_suffix('^'))?;
    normalize_domain(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(line: &str) -> FilterRule {
        parse_filter_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_parse_host_rule() {
        let r = rule("||Ads.Example.com^");
        assert_eq!(r.action, RuleAction::Block);
        assert!(matches!(&r.pattern, RulePattern::Host(d) if d == "ads.example.com"));
        assert_eq!(r.element_types, ElementTypes::DEFAULT);
        assert!(r.party.is_empty());
        assert_eq!(r.raw, "||Ads.Example.com^");
    }

    #[test]
    fn test_parse_exception() {
        let r = rule("@@||example.com^$script");
        assert_eq!(r.action, RuleAction::Allow);
        assert_eq!(r.element_types, ElementTypes::SCRIPT);
    }

    #[test]
    fn test_host_anchor_with_path_is_url_pattern() {
        let r = rule("||example.com^*.js");
        let RulePattern::Url(p) = &r.pattern else {
            panic!("expected url pattern");
        };
        assert_eq!(p.anchor, AnchorType::Hostname);
        assert!(r.flags.contains(RuleFlags::HAS_HOST_ANCHOR));
    }

    #[test]
    fn test_anchors() {
        let r = rule("|https://cdn.|");
        let RulePattern::Url(p) = &r.pattern else {
            panic!("expected url pattern");
        };
        assert_eq!(p.anchor, AnchorType::Left);
        assert!(p.right_anchor);
        assert!(r.flags.contains(RuleFlags::HAS_LEFT_ANCHOR | RuleFlags::HAS_RIGHT_ANCHOR));
    }

    #[test]
    fn test_ignored_lines() {
        for line in [
            "",
            "   ",
            "! comment",
            "[Adblock Plus 2.0]",
            "# hosts comment",
            "example.com##.ad",
            "##.banner",
            "example.com#@#.ad",
            "example.com#?#div:has(.ad)",
            "example.com#$#abort-on-property-read x",
            "example.com#@$#x",
            "example.com#%#window.x=1",
            "example.com#@%#window.x=1",
            "example.com#@?#div",
            "127.0.0.1 localhost",
        ] {
            assert!(matches!(parse_filter_line(line), Ok(None)), "{line:?}");
        }
    }

    #[test]
    fn test_hosts_file_lines() {
        let r = rule("0.0.0.0 tracker.example.net # analytics");
        assert!(matches!(&r.pattern, RulePattern::Host(d) if d == "tracker.example.net"));
        assert!(r.flags.contains(RuleFlags::FROM_HOSTS_FILE));

        let r = rule("::1 ads.example.org");
        assert!(matches!(&r.pattern, RulePattern::Host(d) if d == "ads.example.org"));
    }

    #[test]
    fn test_domain_option() {
        let r = rule("/ads/$domain=a.com|~b.a.com");
        let domains = r.domains.unwrap();
        assert_eq!(domains.include, vec![hash_domain("a.com")]);
        assert_eq!(domains.exclude, vec![hash_domain("b.a.com")]);

        assert!(matches!(
            parse_filter_line("/ads/$domain=google.*"),
            Err(ParseError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_party_options() {
        assert_eq!(rule("||a.com^$third-party").party, PartyMask::THIRD_PARTY);
        assert_eq!(rule("||a.com^$3p").party, PartyMask::THIRD_PARTY);
        assert_eq!(rule("||a.com^$~third-party").party, PartyMask::FIRST_PARTY);
        assert_eq!(rule("||a.com^$1p").party, PartyMask::FIRST_PARTY);
        assert!(rule("||a.com^$1p,3p").party.is_empty());
    }

    #[test]
    fn test_type_options() {
        let r = rule("||a.com^$image,xhr");
        assert_eq!(r.element_types, ElementTypes::IMAGE | ElementTypes::XMLHTTPREQUEST);

        let r = rule("||a.com^$~script");
        assert!(!r.element_types.contains(ElementTypes::SCRIPT));
        assert!(r.element_types.contains(ElementTypes::IMAGE));

        assert!(matches!(
            parse_filter_line("||a.com^$script,~script"),
            Err(ParseError::EmptyTypeMask)
        ));
    }

    #[test]
    fn test_unsupported_modifiers_are_rejected() {
        for line in [
            "||a.com^$csp=script-src 'none'",
            "||a.com^$removeparam=utm_source",
            "||a.com^$redirect-rule=noopjs",
            "@@||a.com^$elemhide",
            "@@||a.com^$generichide",
            "||a.com^$header=x-ad",
        ] {
            assert!(
                matches!(parse_filter_line(line), Err(ParseError::UnsupportedModifier(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn test_redirect_is_plain_block_and_unknown_options_are_ignored() {
        let r = rule("||a.com/ad.js$script,redirect=noopjs");
        assert_eq!(r.action, RuleAction::Block);
        assert_eq!(r.element_types, ElementTypes::SCRIPT);

        let r = rule("||a.com^$important,some-future-option");
        assert_eq!(r.element_types, ElementTypes::DEFAULT);
    }

    #[test]
    fn test_flags() {
        assert!(rule("/Ads/$match-case").flags.contains(RuleFlags::MATCH_CASE));
        assert!(rule("||a.com^$badfilter").flags.contains(RuleFlags::BADFILTER));
    }

    #[test]
    fn test_regex_rules() {
        let r = rule(r"/banner\d+\.gif$/");
        let RulePattern::Regex(re) = &r.pattern else {
            panic!("expected regex");
        };
        assert!(re.is_match("https://a.com/BANNER12.gif"));

        let r = rule(r"/ad[0-9]+/$script");
        assert_eq!(r.element_types, ElementTypes::SCRIPT);

        assert!(matches!(parse_filter_line("/ad(/"), Err(ParseError::InvalidRegex(_))));
    }

    #[test]
    fn test_dollar_inside_path_stays_in_pattern() {
        let r = rule("/page$1/ad.js");
        assert!(matches!(&r.pattern, RulePattern::Url(p) if p.source == "/page$1/ad.js"));
    }

    #[test]
    fn test_empty_patterns() {
        assert!(matches!(parse_filter_line("@@ "), Err(ParseError::Empty)));
        for line in ["@@$script", "||", "|", "$script"] {
            assert!(matches!(parse_filter_line(line), Err(ParseError::EmptyPattern)), "{line}");
        }
    }

    #[test]
    fn test_parse_filter_list_skips_bad_lines() {
        let text = "! Title: test\n||ads.com^\n||a.com^$script,~script\n@@||ads.com/ok.js\nexample.com##.ad\n/ad(/\n";
        let parsed = parse_filter_list(text, 3);
        assert_eq!(parsed.rules.len(), 2);
        assert!(parsed.rules.iter().all(|r| r.list_id == 3));
        assert_eq!(
            parsed.stats,
            ParseStats {
                lines: 6,
                rules: 2,
                exceptions: 1,
                ignored: 2,
                errors: 2,
            }
        );
    }
}
