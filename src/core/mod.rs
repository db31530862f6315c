//! Core Types
//!
//! Locations, diagnostics, directive bookkeeping and report assembly.

pub mod diagnostics;
pub mod directives;
pub mod location;
pub mod reporter;

pub use diagnostics::{natural_join, Message, Severity};
pub use directives::DirectiveTracker;
pub use location::Location;
pub use reporter::{DefaultLocator, DocumentReport, Report, ReportMessage, Reporter, SelectorLocator};
