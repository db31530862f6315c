//! HTML Validate
//!
//! An offline HTML linter: markup is tokenized, built into a document tree
//! while an event stream drives a set of configurable rules, and the
//! resulting diagnostics are filtered through in-document directives.
//!
//! This library provides:
//! - A located lexer and a tree builder emitting parse events
//! - Element metadata with inheritance and content-model checks
//! - A rule registry with the built-in rules
//! - Disable directives and JSON/text reports

pub mod config;
pub mod core;
pub mod elements;
pub mod parser;
pub mod rules;
pub mod validation;

pub use config::{Config, ConfigError};
pub use crate::core::{DocumentReport, Message, Report, Severity};
pub use elements::MetaTable;
pub use rules::{Rule, RuleContext, RuleRegistry};
pub use validation::HtmlValidate;
