//! Disable Directive Tracking
//!
//! Observes the event stream alongside the rules and records which byte
//! range each `html-validate-disable*` directive covers. Once the document
//! is complete, `resolve` removes the suppressed messages and adds the
//! bookkeeping diagnostics (unused directives, partial overlaps, invalid
//! directives).

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::core::diagnostics::{Message, Severity};
use crate::core::location::Location;
use crate::parser::dom::{CloseKind, Document, NodeId};
use crate::parser::event::{DirectiveAction, DirectiveRule, Event};
use crate::rules::NO_UNUSED_DISABLE;

/// One rule (or all rules) disabled by one directive
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveEntry {
    /// `None` when the directive names no rule
    pub rule: Option<String>,
    pub action: DirectiveAction,
    /// Location of the rule token, or of the directive for all rules
    pub location: Location,
    /// Covered byte range; `None` until known or when nothing is covered
    pub coverage: Option<Range<usize>>,
    pub matched: bool,
}

impl DirectiveEntry {
    fn applies_to(&self, rule_id: &str) -> bool {
        self.rule.as_deref().is_none_or(|rule| rule == rule_id)
    }

    fn covers(&self, offset: usize) -> bool {
        self.coverage
            .as_ref()
            .is_some_and(|range| range.contains(&offset))
    }
}

/// Collects directives and their coverage for one document
#[derive(Debug, Clone, Default)]
pub struct DirectiveTracker {
    /// Every configured rule id, enabled or not
    configured: BTreeSet<String>,
    /// Severity of each enabled rule
    enabled: BTreeMap<String, Severity>,
    entries: Vec<DirectiveEntry>,
    messages: Vec<Message>,
    /// `disable` entries waiting for an `enable`: (entry, start)
    open_ranges: Vec<(usize, usize)>,
    /// `disable-block` entries waiting for their parent: (entry, parent, start)
    open_blocks: Vec<(usize, NodeId, usize)>,
    /// `disable-next` entries waiting for the next element under the parent
    pending_next: Vec<(usize, NodeId)>,
    /// `disable-next` entries waiting for their element to complete
    active_next: Vec<(usize, NodeId)>,
}

impl DirectiveTracker {
    pub fn new(configured: BTreeSet<String>, enabled: BTreeMap<String, Severity>) -> Self {
        Self {
            configured,
            enabled,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[DirectiveEntry] {
        &self.entries
    }

    /// Follow one event of the stream
    pub fn observe(&mut self, event: &Event, document: &Document) {
        match event {
            Event::Directive {
                action,
                rules,
                parent,
                location,
            } => self.directive(*action, rules, *parent, location),
            Event::InvalidDirective { message, location } => {
                self.messages
                    .push(Message::new(None, Severity::Error, message.clone(), location.clone()));
            }
            Event::TagOpen { target, .. } => {
                if let Some(parent) = document.get(*target).and_then(|node| node.parent) {
                    self.start_next(parent, *target);
                }
            }
            Event::TagClose {
                target,
                previous: Some(next),
                kind: CloseKind::Implicit,
                ..
            } => self.start_next(*target, *next),
            Event::ElementReady { target, .. } => self.element_ready(*target, document),
            Event::DomReady => self.close_all(document.source_len()),
            _ => {}
        }
    }

    fn directive(
        &mut self,
        action: DirectiveAction,
        rules: &[DirectiveRule],
        parent: NodeId,
        location: &Location,
    ) {
        let mut ids: Vec<(Option<String>, Location)> = Vec::new();
        for rule in rules {
            if self.configured.contains(&rule.id) {
                ids.push((Some(rule.id.clone()), rule.location.clone()));
            } else {
                self.messages.push(Message::new(
                    None,
                    Severity::Error,
                    format!("Directive references unknown rule \"{}\"", rule.id),
                    rule.location.clone(),
                ));
            }
        }
        if rules.is_empty() {
            ids.push((None, location.clone()));
        }

        if action == DirectiveAction::Enable {
            self.enable(&ids, location.offset);
            return;
        }

        let start = location.end();
        for (rule, rule_location) in ids {
            let entry = self.entries.len();
            self.entries.push(DirectiveEntry {
                rule,
                action,
                location: rule_location,
                coverage: None,
                matched: false,
            });
            match action {
                DirectiveAction::Disable => self.open_ranges.push((entry, start)),
                DirectiveAction::DisableBlock => self.open_blocks.push((entry, parent, start)),
                DirectiveAction::DisableNext => self.pending_next.push((entry, parent)),
                DirectiveAction::Enable => {}
            }
        }
    }

    /// End open `disable` ranges named by an `enable`
    fn enable(&mut self, ids: &[(Option<String>, Location)], at: usize) {
        let enable_all = ids.iter().any(|(rule, _)| rule.is_none());
        let entries = &mut self.entries;
        self.open_ranges.retain(|&(entry, start)| {
            let closes = enable_all
                || ids
                    .iter()
                    .any(|(rule, _)| rule.is_some() && *rule == entries[entry].rule);
            if closes {
                entries[entry].coverage = Some(start..at);
            }
            !closes
        });
    }

    /// Hand `disable-next` entries waiting under `parent` to `next`.
    /// `next` is either a new child or the element that implicitly closed `parent`.
    fn start_next(&mut self, parent: NodeId, next: NodeId) {
        let (started, waiting): (Vec<_>, Vec<_>) = self
            .pending_next
            .drain(..)
            .partition(|&(_, waiting_parent)| waiting_parent == parent);
        self.pending_next = waiting;
        self.active_next
            .extend(started.into_iter().map(|(entry, _)| (entry, next)));
    }

    fn element_ready(&mut self, target: NodeId, document: &Document) {
        let entries = &mut self.entries;

        self.active_next.retain(|&(entry, node)| {
            if node != target {
                return true;
            }
            entries[entry].coverage = document.range(node);
            false
        });

        // The parent closed before any element followed the directive
        self.pending_next.retain(|&(_, parent)| parent != target);

        let end = document.get(target).and_then(|node| node.end_offset);
        self.open_blocks.retain(|&(entry, parent, start)| {
            if parent != target {
                return true;
            }
            entries[entry].coverage = end.map(|end| start..end.max(start));
            false
        });
    }

    fn close_all(&mut self, source_len: usize) {
        for (entry, start) in self.open_ranges.drain(..) {
            self.entries[entry].coverage = Some(start..source_len);
        }
        for (entry, _, start) in self.open_blocks.drain(..) {
            self.entries[entry].coverage = Some(start..source_len);
        }
        self.pending_next.clear();
        self.active_next.clear();
    }

    /// Innermost entry covering `offset` for `rule_id`
    fn covering(&self, rule_id: &str, offset: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.applies_to(rule_id) && entry.covers(offset))
            .max_by(|(_, a), (_, b)| {
                let (a, b) = (a.coverage.as_ref(), b.coverage.as_ref());
                let a_key = a.map(|r| (r.start, usize::MAX - r.end));
                let b_key = b.map(|r| (r.start, usize::MAX - r.end));
                a_key.cmp(&b_key)
            })
            .map(|(index, _)| index)
    }

    /// Drop suppressed messages and add directive diagnostics
    pub fn resolve(mut self, messages: Vec<Message>) -> Vec<Message> {
        let mut visible = Vec::with_capacity(messages.len());
        for message in messages {
            let covering = message
                .rule_id
                .as_deref()
                .and_then(|rule_id| self.covering(rule_id, message.location.offset));
            match covering {
                Some(index) => {
                    log::trace!(
                        "suppressed {:?} at {}",
                        message.rule_id,
                        message.location
                    );
                    self.entries[index].matched = true;
                }
                None => visible.push(message),
            }
        }

        let mut extra = std::mem::take(&mut self.messages);
        extra.extend(self.overlaps());
        extra.extend(self.unused());
        visible.extend(extra);
        visible
    }

    /// Warn about same-rule directives whose ranges cross without nesting
    fn overlaps(&self) -> Vec<Message> {
        let mut warnings = Vec::new();
        for (i, later) in self.entries.iter().enumerate() {
            let (Some(rule), Some(b)) = (&later.rule, &later.coverage) else {
                continue;
            };
            let crossed = self.entries[..i].iter().any(|earlier| {
                earlier.rule.as_ref() == Some(rule)
                    && earlier
                        .coverage
                        .as_ref()
                        .is_some_and(|a| a.start < b.start && b.start < a.end && a.end < b.end)
            });
            if crossed {
                warnings.push(Message::new(
                    None,
                    Severity::Warn,
                    format!(
                        "Directive for \"{}\" partially overlaps a previous directive",
                        rule
                    ),
                    later.location.clone(),
                ));
            }
        }
        warnings
    }

    /// `no-unused-disable` reports for entries that suppressed nothing
    fn unused(&mut self) -> Vec<Message> {
        let Some(&severity) = self.enabled.get(NO_UNUSED_DISABLE) else {
            return Vec::new();
        };

        // Other rules first: their reports may use up a directive that
        // disables `no-unused-disable` itself
        let mut candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.matched)
            .filter_map(|(index, entry)| {
                let rule = entry.rule.as_deref()?;
                self.enabled.contains_key(rule).then_some(index)
            })
            .collect();
        candidates.sort_by_key(|&index| self.entries[index].rule.as_deref() == Some(NO_UNUSED_DISABLE));

        let mut reports = Vec::new();
        for index in candidates {
            if self.entries[index].matched {
                continue;
            }
            let location = self.entries[index].location.clone();
            if let Some(covering) = self.covering(NO_UNUSED_DISABLE, location.offset) {
                self.entries[covering].matched = true;
                continue;
            }
            let rule = self.entries[index].rule.clone().unwrap_or_default();
            reports.push(Message::new(
                Some(NO_UNUSED_DISABLE),
                severity,
                format!("\"{}\" rule is disabled but no error was reported", rule),
                location,
            ));
        }
        reports
    }
}
