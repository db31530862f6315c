//! Element-level rules

use serde::Deserialize;
use serde_json::json;

use super::{parse_options, Rule, RuleContext, RuleRegistry};
use crate::config::ConfigError;
use crate::parser::event::{Event, EventKind};

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("deprecated", |_, _| Ok(Box::new(DeprecatedElement)));
    registry.register("no-unknown-elements", |id, options| {
        NoUnknownElements::new(id, options).map(|rule| Box::new(rule) as Box<dyn Rule>)
    });
}

/// Flags elements whose metadata marks them deprecated
#[derive(Debug, Clone)]
pub struct DeprecatedElement;

impl Rule for DeprecatedElement {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TagOpen]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::TagOpen { target, .. } = event else {
            return;
        };
        let node = &cx.document[*target];
        let Some(deprecated) = cx.meta.for_node(node).and_then(|meta| meta.deprecated.as_ref()) else {
            return;
        };

        let mut message = format!("{} is deprecated", node.display_name());
        if let Some(reason) = &deprecated.message {
            message.push_str(": ");
            message.push_str(reason);
        }
        let context = json!({
            "tagName": node.tag_name,
            "source": deprecated.source,
            "documentation": deprecated.documentation,
        });
        cx.report_with_context(Some(*target), message, None, context);
    }
}

/// Options of `no-unknown-elements`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoUnknownElementsOptions {
    /// Tag names accepted without metadata
    pub allow: Vec<String>,
    /// Accept any custom element name (containing a dash)
    pub allow_custom_elements: bool,
}

/// Flags HTML elements missing from the metadata table
#[derive(Debug, Clone)]
pub struct NoUnknownElements {
    options: NoUnknownElementsOptions,
}

impl NoUnknownElements {
    pub fn new(id: &str, options: Option<&toml::Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            options: parse_options(id, options)?,
        })
    }

    fn is_allowed(&self, tag_name: &str) -> bool {
        (self.options.allow_custom_elements && tag_name.contains('-'))
            || self
                .options
                .allow
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(tag_name))
    }
}

impl Rule for NoUnknownElements {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::TagOpen]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::TagOpen { target, .. } = event else {
            return;
        };
        let node = &cx.document[*target];
        if node.foreign || cx.meta.contains(&node.tag_name) || self.is_allowed(&node.tag_name) {
            return;
        }
        let message = format!("Unknown element {}", node.display_name());
        cx.report(Some(*target), message);
    }
}
