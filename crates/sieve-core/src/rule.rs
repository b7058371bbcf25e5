//! Parsed filter rules and their compiled pattern representation.

use crate::hash::Hash64;
use crate::types::{ElementTypes, PartyMask, RuleAction, RuleFlags};
use crate::url::MIN_TOKEN_LEN;

/// `domain=` option: initiating domains a rule is limited to or excluded from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainConstraint {
    pub include: Vec<Hash64>,
    pub exclude: Vec<Hash64>,
}

impl DomainConstraint {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorType {
    #[default]
    None,
    /// `|` - match starts at the beginning of the URL
    Left,
    /// `||` - match starts at the host or at one of its label boundaries
    Hostname,
}

/// One step of a compiled URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternOp {
    Literal(Box<str>),
    /// `^` - one separator character or the end of the URL
    Separator,
    /// `*` - any run of characters
    Wildcard,
}

/// A compiled wildcard pattern, ready to be verified without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlPattern {
    pub anchor: AnchorType,
    pub right_anchor: bool,
    pub match_case: bool,
    pub ops: Vec<PatternOp>,
    /// Pattern body as written (anchors excluded)
    pub source: String,
}

impl UrlPattern {
    /// Compile a pattern body (anchors already stripped) into ops.
    pub fn compile(body: &str, anchor: AnchorType, right_anchor: bool, match_case: bool) -> Self {
        let mut ops = Vec::new();
        let mut literal = String::new();

        let flush = |literal: &mut String, ops: &mut Vec<PatternOp>| {
            if !literal.is_empty() {
                let text = if match_case {
                    std::mem::take(literal)
                } else {
                    let lower = literal.to_ascii_lowercase();
                    literal.clear();
                    lower
                };
                ops.push(PatternOp::Literal(text.into_boxed_str()));
            }
        };

        for ch in body.chars() {
            match ch {
                '*' => {
                    flush(&mut literal, &mut ops);
                    if ops.last() != Some(&PatternOp::Wildcard) {
                        ops.push(PatternOp::Wildcard);
                    }
                }
                '^' => {
                    flush(&mut literal, &mut ops);
                    ops.push(PatternOp::Separator);
                }
                _ => literal.push(ch),
            }
        }
        flush(&mut literal, &mut ops);

        Self {
            anchor,
            right_anchor,
            match_case,
            ops,
            source: body.to_string(),
        }
    }

    /// Tokens guaranteed to appear as whole alphanumeric runs in every URL this
    /// pattern matches. Only these may be used as index keys.
    pub fn safe_tokens(&self) -> Vec<&str> {
        let mut tokens = Vec::new();

        for (i, op) in self.ops.iter().enumerate() {
            let PatternOp::Literal(text) = op else {
                continue;
            };
            let bytes = text.as_bytes();
            let prev = if i == 0 { None } else { self.ops.get(i - 1) };
            let next = self.ops.get(i + 1);

            let left_bounded = match prev {
                None => self.anchor != AnchorType::None,
                Some(PatternOp::Separator) => true,
                Some(_) => false,
            };
            let right_bounded = match next {
                None => self.right_anchor,
                Some(PatternOp::Separator) => true,
                Some(_) => false,
            };

            let mut start = None;
            for pos in 0..=bytes.len() {
                let is_alnum = pos < bytes.len() && bytes[pos].is_ascii_alphanumeric();
                if is_alnum {
                    start.get_or_insert(pos);
                    continue;
                }
                let Some(s) = start.take() else {
                    continue;
                };
                if pos - s < MIN_TOKEN_LEN {
                    continue;
                }
                if (s == 0 && !left_bounded) || (pos == bytes.len() && !right_bounded) {
                    continue;
                }
                tokens.push(&text[s..pos]);
            }
        }

        tokens
    }
}

/// What a rule matches against.
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// `||domain^` - the request host is `domain` or one of its subdomains
    Host(String),
    /// Wildcard / anchored URL pattern
    Url(UrlPattern),
    /// `/regex/`
    Regex(regex::Regex),
}

impl RulePattern {
    /// Pattern text used for dedupe keys and diagnostics.
    pub fn source(&self) -> &str {
        match self {
            Self::Host(domain) => domain,
            Self::Url(pattern) => &pattern.source,
            Self::Regex(re) => re.as_str(),
        }
    }

    pub fn kind(&self) -> u8 {
        match self {
            Self::Host(_) => 0,
            Self::Url(_) => 1,
            Self::Regex(_) => 2,
        }
    }
}

/// A parsed filter rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    pub pattern: RulePattern,
    pub element_types: ElementTypes,
    pub party: PartyMask,
    pub domains: Option<DomainConstraint>,
    pub list_id: u16,
    /// Source line, for diagnostics
    pub raw: String,
}

impl FilterRule {
    /// An unrestricted rule for `pattern`.
    pub fn new(action: RuleAction, pattern: RulePattern) -> Self {
        Self {
            action,
            flags: RuleFlags::empty(),
            pattern,
            element_types: ElementTypes::DEFAULT,
            party: PartyMask::empty(),
            domains: None,
            list_id: 0,
            raw: String::new(),
        }
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        self.action == RuleAction::Allow
    }
}
