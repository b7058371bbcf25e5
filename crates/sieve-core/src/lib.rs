//! Sieve Core Library
//!
//! This crate provides the request-filtering engine of the Sieve content
//! blocker: the in-memory filter index, the match evaluator, origin
//! classification, tracking-parameter rewriting and the per-request policy
//! gate. Parsing filter-list text lives in `sieve-compiler`.
//!
//! # Architecture
//!
//! Filter rules are compiled once into a [`FilterIndex`] that is read-only
//! afterwards. Every request is turned into a [`Verdict`] by
//! [`PolicyGate::evaluate`], synchronously and without I/O. Reloading lists
//! means building a new index and swapping it in.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hash functions for domain and token keys
//! - `origin`: first-party / third-party classification
//! - `url`: Fast URL helpers without allocations
//! - `rule`: Parsed rules and compiled patterns
//! - `index`: Domain, token and fallback buckets
//! - `matcher`: Candidate verification and exception precedence
//! - `rewriter`: Tracking-parameter stripping
//! - `settings`: User blocking settings
//! - `policy`: Per-request decision
//! - `counter`: Blocked-request tally
//! - `types`: Shared type definitions

pub mod counter;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod origin;
pub mod policy;
pub mod rewriter;
pub mod rule;
pub mod settings;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use counter::{BlockedRequestCounter, CountStore, CountStoreError};
pub use hash::{hash64, hash_domain, hash_token, Hash64};
pub use index::{FilterIndex, IndexKey, IndexStats};
pub use matcher::{matches, MatchContext, MatchOptions, MatchOutcome, Matcher};
pub use origin::{is_third_party, OriginError};
pub use policy::PolicyGate;
pub use rewriter::{strip_tracking_params, ParamRewriter};
pub use rule::{AnchorType, DomainConstraint, FilterRule, PatternOp, RulePattern, UrlPattern};
pub use settings::{BlockingLevel, BlockingSettings, RawSettings, SettingsError};
pub use types::{
    Decision, ElementTypes, PartyMask, RequestDescriptor, ResourceType, RuleAction, RuleFlags,
    Verdict,
};
