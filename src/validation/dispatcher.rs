//! Event Dispatcher
//!
//! Routes each event of one document to the rules subscribed to its kind.
//! The directive tracker sees every event before any rule does.

use std::collections::HashMap;

use crate::core::diagnostics::Message;
use crate::core::directives::DirectiveTracker;
use crate::elements::MetaTable;
use crate::parser::dom::Document;
use crate::parser::event::{Event, EventKind, EventSink};
use crate::rules::{ConfiguredRule, RuleContext};

/// Per-document event router
pub struct Dispatcher<'a> {
    meta: &'a MetaTable,
    rules: Vec<ConfiguredRule>,
    routes: HashMap<EventKind, Vec<usize>>,
    tracker: DirectiveTracker,
    messages: Vec<Message>,
}

impl<'a> Dispatcher<'a> {
    /// `rules` must be fresh clones owned by this document
    pub fn new(meta: &'a MetaTable, rules: Vec<ConfiguredRule>, tracker: DirectiveTracker) -> Self {
        let mut routes: HashMap<EventKind, Vec<usize>> = HashMap::new();
        for (index, configured) in rules.iter().enumerate() {
            for kind in configured.rule.subscriptions() {
                routes.entry(*kind).or_default().push(index);
            }
        }
        Self {
            meta,
            rules,
            routes,
            tracker,
            messages: Vec::new(),
        }
    }

    /// Number of rules listening to `kind`
    pub fn listeners(&self, kind: EventKind) -> usize {
        self.routes.get(&kind).map_or(0, Vec::len)
    }

    /// Raw rule messages and the tracker holding the directive state
    pub fn finish(self) -> (Vec<Message>, DirectiveTracker) {
        (self.messages, self.tracker)
    }
}

impl EventSink for Dispatcher<'_> {
    fn emit(&mut self, event: Event, document: &Document) {
        self.tracker.observe(&event, document);

        let Some(indices) = self.routes.get(&event.kind()) else {
            return;
        };
        for &index in indices {
            let ConfiguredRule { id, severity, rule } = &mut self.rules[index];
            let mut cx = RuleContext::new(
                id.as_str(),
                *severity,
                document,
                self.meta,
                event.location(),
                &mut self.messages,
            );
            rule.handle(&event, &mut cx);
        }
    }
}
