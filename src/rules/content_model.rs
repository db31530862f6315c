//! Content-model rules
//!
//! Thin wrappers running one content-model check per completed element.

use super::{Rule, RuleContext, RuleRegistry};
use crate::parser::dom::NodeId;
use crate::parser::event::{Event, EventKind};
use crate::validation::content_model::{self, Violation};

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("element-permitted-content", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::PermittedContent)))
    });
    registry.register("element-permitted-parent", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::PermittedParent)))
    });
    registry.register("element-permitted-order", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::PermittedOrder)))
    });
    registry.register("element-permitted-occurrences", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::PermittedOccurrences)))
    });
    registry.register("element-required-content", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::RequiredContent)))
    });
    registry.register("element-required-ancestor", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::RequiredAncestor)))
    });
    registry.register("element-required-attributes", |_, _| {
        Ok(Box::new(ContentModelRule::new(Check::RequiredAttributes)))
    });
}

/// Which content-model constraint a rule enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    PermittedContent,
    PermittedParent,
    PermittedOrder,
    PermittedOccurrences,
    RequiredContent,
    RequiredAncestor,
    RequiredAttributes,
}

/// Runs its check once the element and all of its children are parsed
#[derive(Debug, Clone)]
pub struct ContentModelRule {
    check: Check,
}

impl ContentModelRule {
    pub fn new(check: Check) -> Self {
        Self { check }
    }

    fn violations(&self, cx: &RuleContext<'_>, target: NodeId) -> Vec<Violation> {
        let (document, meta) = (cx.document, cx.meta);
        match self.check {
            Check::PermittedContent => content_model::permitted_content(document, meta, target),
            Check::PermittedParent => content_model::permitted_parent(document, meta, target)
                .into_iter()
                .collect(),
            Check::PermittedOrder => content_model::permitted_order(document, meta, target),
            Check::PermittedOccurrences => {
                content_model::permitted_occurrences(document, meta, target)
            }
            Check::RequiredContent => content_model::required_content(document, meta, target),
            Check::RequiredAncestor => content_model::required_ancestors(document, meta, target)
                .into_iter()
                .collect(),
            Check::RequiredAttributes => {
                content_model::required_attributes(document, meta, target)
            }
        }
    }
}

impl Rule for ContentModelRule {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::ElementReady]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::ElementReady { target, .. } = event else {
            return;
        };
        for violation in self.violations(cx, *target) {
            // Report on the offending node, not on the closing tag
            let location = cx.document[violation.node].location.clone();
            cx.report_with_context(
                Some(violation.node),
                violation.message,
                Some(location),
                violation.context,
            );
        }
    }
}
