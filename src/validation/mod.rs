//! Validation
//!
//! Content-model checks, per-document event dispatch and the engine tying
//! parsing, rules and reporting together.

pub mod content_model;
pub mod dispatcher;
pub mod engine;

pub use dispatcher::Dispatcher;
pub use engine::HtmlValidate;
