//! Rules
//!
//! A rule subscribes to event kinds and reports through a `RuleContext`.
//! Rules are created from the configuration once, validated, and then
//! cloned for every document so no state leaks between documents.

pub mod attributes;
pub mod content_model;
pub mod elements;
pub mod structure;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::config::{Config, ConfigError};
use crate::core::diagnostics::{Message, Severity};
use crate::core::location::Location;
use crate::elements::MetaTable;
use crate::parser::dom::{Document, NodeId};
use crate::parser::event::{Event, EventKind};

/// Rule id of the unused-directive check
pub const NO_UNUSED_DISABLE: &str = "no-unused-disable";

/// Rules enabled by the `recommended` preset
pub const RECOMMENDED: &[(&str, Severity)] = &[
    ("attr-quotes", Severity::Error),
    ("close-order", Severity::Error),
    ("deprecated", Severity::Error),
    ("element-permitted-content", Severity::Error),
    ("element-permitted-occurrences", Severity::Error),
    ("element-permitted-order", Severity::Error),
    ("element-permitted-parent", Severity::Error),
    ("element-required-ancestor", Severity::Error),
    ("element-required-attributes", Severity::Error),
    ("element-required-content", Severity::Error),
    ("missing-doctype", Severity::Warn),
    ("no-dup-attr", Severity::Error),
    ("no-inline-style", Severity::Warn),
    ("no-self-closing", Severity::Error),
    ("no-unknown-elements", Severity::Error),
    (NO_UNUSED_DISABLE, Severity::Error),
];

/// A validation rule
pub trait Rule: RuleClone + Send + Sync {
    /// Event kinds delivered to `handle`
    fn subscriptions(&self) -> &'static [EventKind];

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>);
}

/// Object-safe cloning for boxed rules
pub trait RuleClone {
    fn clone_box(&self) -> Box<dyn Rule>;
}

impl<T> RuleClone for T
where
    T: Rule + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Rule> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Rule> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Everything a rule may use while handling one event
pub struct RuleContext<'a> {
    pub rule_id: &'a str,
    pub severity: Severity,
    pub document: &'a Document,
    pub meta: &'a MetaTable,
    event_location: Option<&'a Location>,
    messages: &'a mut Vec<Message>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        rule_id: &'a str,
        severity: Severity,
        document: &'a Document,
        meta: &'a MetaTable,
        event_location: Option<&'a Location>,
        messages: &'a mut Vec<Message>,
    ) -> Self {
        Self {
            rule_id,
            severity,
            document,
            meta,
            event_location,
            messages,
        }
    }

    /// Report at the event location, else at the node
    pub fn report(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.push(node, message.into(), None, None);
    }

    /// Report at an explicit location
    pub fn report_at(&mut self, node: Option<NodeId>, message: impl Into<String>, location: Location) {
        self.push(node, message.into(), Some(location), None);
    }

    /// Report with a context payload, optionally at an explicit location
    pub fn report_with_context(
        &mut self,
        node: Option<NodeId>,
        message: impl Into<String>,
        location: Option<Location>,
        context: serde_json::Value,
    ) {
        self.push(node, message.into(), location, Some(context));
    }

    fn push(
        &mut self,
        node: Option<NodeId>,
        message: String,
        location: Option<Location>,
        context: Option<serde_json::Value>,
    ) {
        let location = location
            .or_else(|| self.event_location.cloned())
            .or_else(|| {
                node.and_then(|id| self.document.get(id))
                    .map(|node| node.location.clone())
            })
            .unwrap_or_else(|| Location {
                size: 0,
                ..self.document.root().location.clone()
            });

        self.messages.push(
            Message::new(Some(self.rule_id), self.severity, message, location)
                .with_node(node)
                .with_context(context),
        );
    }
}

/// Rule factory: validates options and builds a prototype
pub type RuleFactory = fn(rule_id: &str, options: Option<&toml::Value>) -> Result<Box<dyn Rule>, ConfigError>;

/// An instantiated rule with its configured identity
#[derive(Clone)]
pub struct ConfiguredRule {
    pub id: String,
    pub severity: Severity,
    pub rule: Box<dyn Rule>,
}

impl std::fmt::Debug for ConfiguredRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredRule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Identifier to factory map
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    factories: BTreeMap<String, RuleFactory>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        structure::register(&mut registry);
        content_model::register(&mut registry);
        elements::register(&mut registry);
        attributes::register(&mut registry);
        registry
    }

    /// Add or replace a rule
    pub fn register(&mut self, id: &str, factory: RuleFactory) {
        self.factories.insert(id.to_string(), factory);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build prototypes for every enabled rule in `config`.
    ///
    /// Unknown ids become a stub that reports the missing definition.
    pub fn instantiate(&self, config: &Config) -> Result<Vec<ConfiguredRule>, ConfigError> {
        let mut rules = Vec::new();
        for (id, setting) in &config.rules {
            if !setting.severity.is_enabled() {
                continue;
            }
            let rule = match self.factories.get(id) {
                Some(factory) => factory(id, setting.options.as_ref())?,
                None => {
                    log::warn!("no definition for configured rule '{}'", id);
                    Box::new(MissingRule)
                }
            };
            rules.push(ConfiguredRule {
                id: id.clone(),
                severity: setting.severity,
                rule,
            });
        }
        log::debug!("instantiated {} rules", rules.len());
        Ok(rules)
    }
}

/// Deserialize rule options, using defaults when none are given
pub fn parse_options<T>(rule_id: &str, options: Option<&toml::Value>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    match options {
        None => Ok(T::default()),
        Some(value) => value
            .clone()
            .try_into::<T>()
            .map_err(|err| ConfigError::InvalidOptions {
                rule: rule_id.to_string(),
                path: format!("rules.{}[1]", rule_id),
                message: err.to_string(),
            }),
    }
}

/// Stand-in for a configured rule without definition
#[derive(Debug, Clone)]
pub struct MissingRule;

impl Rule for MissingRule {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::DomReady]
    }

    fn handle(&mut self, _event: &Event, cx: &mut RuleContext<'_>) {
        let message = format!("Definition for rule '{}' was not found", cx.rule_id);
        cx.report(None, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default, deny_unknown_fields)]
    struct Options {
        strict: bool,
    }

    #[test]
    fn test_builtin_registry_covers_recommended() {
        let registry = RuleRegistry::with_builtin_rules();
        for (id, _) in RECOMMENDED {
            assert!(registry.contains(id), "missing rule {}", id);
        }
        assert_eq!(registry.rule_ids().count(), RECOMMENDED.len());
    }

    #[test]
    fn test_instantiate_skips_disabled_and_stubs_unknown() {
        let config = Config::empty()
            .with_rule("close-order", Severity::Error)
            .with_rule("deprecated", Severity::Disabled)
            .with_rule("no-such-rule", Severity::Warn);
        let rules = RuleRegistry::with_builtin_rules().instantiate(&config).unwrap();

        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["close-order", "no-such-rule"]);
        assert_eq!(rules[1].rule.subscriptions(), &[EventKind::DomReady]);
    }

    #[test]
    fn test_invalid_options_are_fatal() {
        let options: toml::Value = toml::from_str("style = \"backtick\"").unwrap();
        let config = Config::empty().with_rule_options("attr-quotes", Severity::Error, options);
        let err = RuleRegistry::with_builtin_rules()
            .instantiate(&config)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { ref rule, .. } if rule == "attr-quotes"));
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(parse_options::<Options>("x", None).unwrap(), Options::default());

        let value: toml::Value = toml::from_str("strict = true").unwrap();
        assert!(parse_options::<Options>("x", Some(&value)).unwrap().strict);

        let bad: toml::Value = toml::from_str("strict = 1").unwrap();
        let err = parse_options::<Options>("x", Some(&bad)).unwrap_err();
        assert!(err.to_string().starts_with("rule 'x': invalid options at rules.x[1]"));
    }

    #[test]
    fn test_report_location_precedence() {
        let meta = MetaTable::html5().unwrap();
        let (doc, _) = crate::parser::parse("<div>\n<p></p></div>", "inline", &meta).unwrap();
        let p = doc.elements().find(|n| n.tag_name == "p").unwrap().id;
        let event_location = Location::new(doc.root().location.filename.clone(), 0, 1, 1, 4);
        let explicit = Location::new(doc.root().location.filename.clone(), 3, 1, 4, 1);

        let mut messages = Vec::new();
        {
            let mut cx = RuleContext::new("test", Severity::Warn, &doc, &meta, None, &mut messages);
            cx.report(Some(p), "node");
            cx.report(None, "fallback");
        }
        {
            let mut cx = RuleContext::new(
                "test",
                Severity::Warn,
                &doc,
                &meta,
                Some(&event_location),
                &mut messages,
            );
            cx.report(Some(p), "event");
            cx.report_at(Some(p), "explicit", explicit.clone());
        }

        assert_eq!(messages[0].location.line, 2);
        assert_eq!(messages[1].location.offset, 0);
        assert_eq!(messages[1].location.size, 0);
        assert_eq!(messages[2].location, event_location);
        assert_eq!(messages[3].location, explicit);
        assert!(messages.iter().all(|m| m.rule_id.as_deref() == Some("test")));
    }
}
