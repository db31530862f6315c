//! Document structure rules

use serde::Deserialize;
use serde_json::json;

use super::{parse_options, Rule, RuleContext, RuleRegistry, NO_UNUSED_DISABLE};
use crate::config::ConfigError;
use crate::parser::dom::CloseKind;
use crate::parser::event::{Event, EventKind, StructuralError};

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("close-order", |id, options| {
        CloseOrder::new(id, options).map(|rule| Box::new(rule) as Box<dyn Rule>)
    });
    registry.register("no-self-closing", |id, options| {
        NoSelfClosing::new(id, options).map(|rule| Box::new(rule) as Box<dyn Rule>)
    });
    registry.register("missing-doctype", |_, _| Ok(Box::new(MissingDoctype::default())));
    registry.register(NO_UNUSED_DISABLE, |_, _| Ok(Box::new(NoUnusedDisable)));
}

/// Options of `close-order`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloseOrderOptions {
    pub stray_end_tags: bool,
    pub unclosed: bool,
    pub mismatched: bool,
}

impl Default for CloseOrderOptions {
    fn default() -> Self {
        Self {
            stray_end_tags: true,
            unclosed: true,
            mismatched: true,
        }
    }
}

/// Reports the structural errors found by the tree builder
#[derive(Debug, Clone)]
pub struct CloseOrder {
    options: CloseOrderOptions,
}

impl CloseOrder {
    pub fn new(id: &str, options: Option<&toml::Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            options: parse_options(id, options)?,
        })
    }
}

impl Rule for CloseOrder {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::ParseError]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::ParseError { error, target, .. } = event else {
            return;
        };
        let (enabled, kind) = match error {
            StructuralError::StrayEndTag { .. } => (self.options.stray_end_tags, "stray-end-tag"),
            StructuralError::MismatchedClose { .. } => (self.options.mismatched, "mismatched-close"),
            StructuralError::UnclosedElement { .. } => (self.options.unclosed, "unclosed-element"),
        };
        if enabled {
            cx.report_with_context(*target, error.to_string(), None, json!({ "kind": kind }));
        }
    }
}

/// Options of `no-self-closing`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoSelfClosingOptions {
    /// Allow `/>` inside SVG and MathML
    pub ignore_foreign: bool,
    /// Also flag `/>` on void elements
    pub void: bool,
}

impl Default for NoSelfClosingOptions {
    fn default() -> Self {
        Self {
            ignore_foreign: true,
            void: false,
        }
    }
}

/// Disallows `<div/>`; optionally also `<br/>`
#[derive(Debug, Clone)]
pub struct NoSelfClosing {
    options: NoSelfClosingOptions,
}

impl NoSelfClosing {
    pub fn new(id: &str, options: Option<&toml::Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            options: parse_options(id, options)?,
        })
    }
}

impl Rule for NoSelfClosing {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TagClose]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::TagClose { target, kind, .. } = event else {
            return;
        };
        let document = cx.document;
        let node = &document[*target];
        let flagged = match kind {
            CloseKind::SelfClosed => !(node.foreign && self.options.ignore_foreign),
            CloseKind::Void => node.self_closed && self.options.void,
            _ => false,
        };
        if flagged {
            let message = format!("{} must not be self-closed", node.display_name());
            let location = node.location.clone();
            cx.report_at(Some(*target), message, location);
        }
    }
}

/// Requires a `<!doctype>` declaration
#[derive(Debug, Clone, Default)]
pub struct MissingDoctype {
    seen: bool,
}

impl Rule for MissingDoctype {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Doctype, EventKind::DomReady]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        match event {
            Event::Doctype { .. } => self.seen = true,
            Event::DomReady if !self.seen => cx.report(None, "Document is missing doctype"),
            _ => {}
        }
    }
}

/// Placeholder so the unused-directive check can be configured like any
/// other rule; the directive tracker does the reporting.
#[derive(Debug, Clone)]
pub struct NoUnusedDisable;

impl Rule for NoUnusedDisable {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[]
    }

    fn handle(&mut self, _event: &Event, _cx: &mut RuleContext<'_>) {}
}
