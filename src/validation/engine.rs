//! Validation Engine
//!
//! Drives one document through lexer, tree builder, dispatcher and
//! reporter. The engine itself is immutable after setup and can be shared
//! between threads; every document gets its own rule instances.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, ConfigError};
use crate::core::diagnostics::Severity;
use crate::core::directives::DirectiveTracker;
use crate::core::reporter::{DefaultLocator, DocumentReport, Reporter, SelectorLocator};
use crate::elements::MetaTable;
use crate::parser::parse_into;
use crate::rules::{ConfiguredRule, RuleRegistry};
use crate::validation::dispatcher::Dispatcher;

/// Configured validator
#[derive(Clone)]
pub struct HtmlValidate {
    meta: Arc<MetaTable>,
    /// Prototypes, cloned for each document
    rules: Vec<ConfiguredRule>,
    configured: BTreeSet<String>,
    enabled: BTreeMap<String, Severity>,
    locator: Arc<dyn SelectorLocator>,
}

impl std::fmt::Debug for HtmlValidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlValidate")
            .field("elements", &self.meta.len())
            .field("rules", &self.rules)
            .finish()
    }
}

impl HtmlValidate {
    /// Set up with the built-in rules
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_registry(config, &RuleRegistry::with_builtin_rules())
    }

    /// Set up with a caller supplied registry.
    ///
    /// Metadata and rule options are validated here; any error is fatal.
    pub fn with_registry(config: &Config, registry: &RuleRegistry) -> Result<Self, ConfigError> {
        let meta = MetaTable::html5_with(config.elements.clone())?;
        let rules = registry.instantiate(config)?;
        let enabled = rules
            .iter()
            .map(|configured| (configured.id.clone(), configured.severity))
            .collect();
        log::debug!(
            "engine ready: {} elements, {} active rules",
            meta.len(),
            rules.len()
        );
        Ok(Self {
            meta: Arc::new(meta),
            rules,
            configured: config.rules.keys().cloned().collect(),
            enabled,
            locator: Arc::new(DefaultLocator),
        })
    }

    /// Replace the selector locator
    pub fn with_locator(mut self, locator: Arc<dyn SelectorLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn meta(&self) -> &MetaTable {
        &self.meta
    }

    /// Ids of the rules that run on every document
    pub fn active_rules(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|configured| configured.id.as_str())
    }

    /// Validate markup held in memory
    pub fn validate_string(&self, source: &str, filename: &str) -> DocumentReport {
        let tracker = DirectiveTracker::new(self.configured.clone(), self.enabled.clone());
        let mut dispatcher = Dispatcher::new(&self.meta, self.rules.clone(), tracker);
        let mut reporter = Reporter::new();

        match parse_into(source, filename, &self.meta, &mut dispatcher) {
            Ok(document) => {
                let (messages, tracker) = dispatcher.finish();
                log::debug!("{}: {} raw messages", filename, messages.len());
                reporter.extend(tracker.resolve(messages));
                reporter.finish(filename, Some(&document), self.locator.as_ref())
            }
            Err(err) => {
                log::debug!("{}: lexer failed: {}", filename, err);
                reporter.add_error(None, err.to_string(), err.location().clone());
                reporter.finish(filename, None, self.locator.as_ref())
            }
        }
    }

    /// Read and validate a file from disk
    pub fn validate_file(&self, path: &Path) -> Result<DocumentReport> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.validate_string(&source, &path.display().to_string()))
    }
}
