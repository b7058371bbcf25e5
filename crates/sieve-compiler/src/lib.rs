//! Sieve Filter List Compiler
//!
//! This crate turns ABP/uBO-style filter lists and hosts files into a
//! [`sieve_core::FilterIndex`].

pub mod builder;
pub mod optimizer;
pub mod parser;

pub use builder::{parse, BuildStats, IndexBuilder};
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_filter_line, parse_filter_list, ParseError, ParseStats, ParsedList};
