//! Tree Builder
//!
//! Consumes tokens one at a time, maintains the stack of open elements and
//! grows the document arena. Every structural step is reported to an
//! `EventSink` as it happens, so observers see the tree exactly as it was
//! when the event fired.
//!
//! Malformed markup never aborts construction: unexpected end tags and
//! unclosed elements become `ParseError` events and the builder recovers.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::core::location::Location;
use crate::elements::MetaTable;
use crate::parser::dom::{Attribute, CloseKind, Document, NodeId, NodeKind};
use crate::parser::event::{DirectiveAction, DirectiveRule, Event, EventSink, StructuralError};
use crate::parser::lexer::{Token, TokenKind};

/// `[html-validate-ACTION RULE, RULE: comment]`
static DIRECTIVE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*\[html-validate-([A-Za-z0-9-]+)(?:\s+([^\]:]*))?(?::[^\]]*)?\]\s*$")
        .map_err(|err| log::error!("directive pattern failed to compile: {}", err))
        .ok()
});

const DIRECTIVE_PREFIX: &str = "[html-validate-";

/// Attribute name waiting for a possible value
#[derive(Debug)]
struct PendingAttr {
    key: String,
    location: Location,
}

/// Tag whose `>` has not been seen yet
#[derive(Debug)]
enum PendingTag {
    Open {
        node: NodeId,
        attr: Option<PendingAttr>,
    },
    Close {
        name: String,
        location: Location,
    },
}

/// Incremental document builder
pub struct TreeBuilder<'a> {
    meta: &'a MetaTable,
    filename: Arc<str>,
    document: Document,
    stack: Vec<NodeId>,
    pending: Option<PendingTag>,
    started: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(meta: &'a MetaTable, filename: &str, source_len: usize) -> Self {
        let filename: Arc<str> = Arc::from(filename);
        let mut root_location = Location::start_of(filename.clone());
        root_location.size = source_len;
        Self {
            meta,
            filename,
            document: Document::new(root_location, source_len),
            stack: vec![NodeId::ROOT],
            pending: None,
            started: false,
        }
    }

    /// Document in its current, possibly incomplete, state
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Currently open elements, root first
    pub fn open_elements(&self) -> &[NodeId] {
        &self.stack
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn emit(&self, sink: &mut dyn EventSink, event: Event) {
        sink.emit(event, &self.document);
    }

    fn start(&mut self, sink: &mut dyn EventSink) {
        if !self.started {
            self.started = true;
            log::trace!("building document {}", self.filename);
            self.emit(sink, Event::DomLoad);
        }
    }

    /// Feed one token
    pub fn push(&mut self, token: Token, sink: &mut dyn EventSink) {
        self.start(sink);

        match token.kind {
            TokenKind::TagOpen if token.is_end_tag() => {
                self.pending = Some(PendingTag::Close {
                    name: token.tag_name().to_string(),
                    location: token.location,
                });
            }
            TokenKind::TagOpen => self.open_tag(&token, sink),
            TokenKind::AttrName => {
                self.flush_attribute(None, sink);
                if let Some(PendingTag::Open { attr, .. }) = self.pending.as_mut() {
                    *attr = Some(PendingAttr {
                        key: token.text,
                        location: token.location,
                    });
                }
            }
            TokenKind::AttrValue => self.flush_attribute(Some(&token), sink),
            TokenKind::TagClose => {
                self.flush_attribute(None, sink);
                self.end_of_tag(&token, sink);
            }
            TokenKind::Text => self.text(token),
            TokenKind::Comment => self.comment(&token, sink),
            TokenKind::Doctype => {
                let value = token.doctype_value().to_string();
                self.emit(
                    sink,
                    Event::Doctype {
                        value,
                        location: token.location,
                    },
                );
            }
        }
    }

    /// Close everything still open and return the finished document
    pub fn finish(mut self, sink: &mut dyn EventSink) -> Document {
        self.start(sink);

        let source_len = self.document.source_len();
        while self.stack.len() > 1 {
            let id = self.current();
            let location = self.document[id].location.clone();
            if !self.has_optional_end(id) {
                let tag = self.document[id].tag_name.clone();
                self.emit(
                    sink,
                    Event::ParseError {
                        error: StructuralError::UnclosedElement { tag },
                        target: Some(id),
                        location: location.clone(),
                    },
                );
            }
            self.close_current(CloseKind::EndOfInput, None, location, source_len, sink);
        }

        let root = self.document.get_mut(NodeId::ROOT);
        root.end_offset = Some(source_len);
        self.emit(sink, Event::DomReady);
        log::trace!("document {} has {} nodes", self.filename, self.document.len());
        self.document
    }

    fn open_tag(&mut self, token: &Token, sink: &mut dyn EventSink) {
        let parent = self.current();
        let in_foreign = self.document[parent].foreign;
        let written = token.tag_name();
        let meta = self.meta.resolve(written);

        let tag_name = if in_foreign {
            written.to_string()
        } else {
            written.to_ascii_lowercase()
        };
        let foreign = in_foreign || meta.is_some_and(|m| m.foreign);
        let void = !in_foreign && meta.is_some_and(|m| m.void);

        let id = self
            .document
            .create(NodeKind::Element, tag_name.clone(), token.location.clone());
        {
            let node = self.document.get_mut(id);
            node.foreign = foreign;
            node.void = void;
        }

        if !in_foreign {
            self.close_implicitly(id, &tag_name, &token.location, sink);
        }

        let parent = self.current();
        self.document.append_child(parent, id);
        self.stack.push(id);
        self.pending = Some(PendingTag::Open { node: id, attr: None });
        self.emit(
            sink,
            Event::TagOpen {
                target: id,
                location: token.location.clone(),
            },
        );
    }

    /// Close open elements that `tag_name` ends by starting
    fn close_implicitly(
        &mut self,
        new_node: NodeId,
        tag_name: &str,
        location: &Location,
        sink: &mut dyn EventSink,
    ) {
        while self.stack.len() > 1 {
            let top = self.current();
            let closes = self
                .meta
                .for_node(&self.document[top])
                .is_some_and(|meta| meta.is_implicitly_closed_by(tag_name));
            if !closes {
                break;
            }
            self.close_current(
                CloseKind::Implicit,
                Some(new_node),
                location.clone(),
                location.offset,
                sink,
            );
        }
    }

    fn flush_attribute(&mut self, value: Option<&Token>, sink: &mut dyn EventSink) {
        let Some(PendingTag::Open { node, attr }) = self.pending.as_mut() else {
            return;
        };
        let node = *node;
        let Some(pending) = attr.take() else {
            return;
        };

        let (value, quote, value_location) = match value {
            Some(token) => {
                let (text, quote) = token.attr_value();
                (
                    Some(text.to_string()),
                    Some(quote),
                    Some(token.location.clone()),
                )
            }
            None => (None, None, None),
        };

        self.emit(
            sink,
            Event::Attr {
                target: node,
                key: pending.key.clone(),
                value: value.clone(),
                quote,
                location: pending.location.clone(),
                value_location: value_location.clone(),
            },
        );
        self.document.set_attribute(
            node,
            Attribute {
                key: pending.key,
                value,
                quote,
                key_location: pending.location,
                value_location,
            },
        );
    }

    fn end_of_tag(&mut self, token: &Token, sink: &mut dyn EventSink) {
        match self.pending.take() {
            Some(PendingTag::Open { node, .. }) => {
                let self_closing = token.is_self_closing();
                let void = {
                    let element = self.document.get_mut(node);
                    element.location.extend_to(&token.location);
                    element.self_closed = self_closing;
                    element.void
                };
                if void || self_closing {
                    let kind = if void {
                        CloseKind::Void
                    } else {
                        CloseKind::SelfClosed
                    };
                    let location = self.document[node].location.clone();
                    self.close_current(kind, None, location, token.location.end(), sink);
                }
            }
            Some(PendingTag::Close { name, mut location }) => {
                location.extend_to(&token.location);
                self.close_tag(&name, location, sink);
            }
            None => {}
        }
    }

    fn close_tag(&mut self, name: &str, location: Location, sink: &mut dyn EventSink) {
        let matching = self
            .stack
            .iter()
            .rposition(|&id| id != NodeId::ROOT && self.document[id].tag_name.eq_ignore_ascii_case(name));

        let Some(position) = matching else {
            let is_void = self.meta.resolve(name).is_some_and(|meta| meta.void);
            let (error, target) = if self.stack.len() == 1 || is_void {
                (
                    StructuralError::StrayEndTag {
                        tag: name.to_string(),
                    },
                    None,
                )
            } else {
                let top = self.current();
                (
                    StructuralError::MismatchedClose {
                        expected: self.document[top].tag_name.clone(),
                        found: name.to_string(),
                    },
                    Some(top),
                )
            };
            log::trace!("{} at {}", error, location);
            self.emit(
                sink,
                Event::ParseError {
                    error,
                    target,
                    location,
                },
            );
            return;
        };

        let end = location.end();
        while self.stack.len() > position + 1 {
            let top = self.current();
            if !self.has_optional_end(top) {
                let expected = self.document[top].tag_name.clone();
                self.emit(
                    sink,
                    Event::ParseError {
                        error: StructuralError::MismatchedClose {
                            expected,
                            found: name.to_string(),
                        },
                        target: Some(top),
                        location: location.clone(),
                    },
                );
            }
            self.close_current(CloseKind::Implicit, None, location.clone(), location.offset, sink);
        }
        self.close_current(CloseKind::Explicit, None, location, end, sink);
    }

    /// Pop the current element and report it closed
    fn close_current(
        &mut self,
        kind: CloseKind,
        previous: Option<NodeId>,
        location: Location,
        end_offset: usize,
        sink: &mut dyn EventSink,
    ) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(target) = self.stack.pop() else {
            return;
        };
        {
            let node = self.document.get_mut(target);
            node.closed = Some(kind);
            node.end_offset = Some(end_offset.max(node.location.end()));
        }
        self.emit(
            sink,
            Event::TagClose {
                target,
                previous,
                kind,
                location: location.clone(),
            },
        );
        self.emit(sink, Event::ElementReady { target, location });
    }

    fn has_optional_end(&self, id: NodeId) -> bool {
        self.meta
            .for_node(&self.document[id])
            .is_some_and(|meta| meta.optional_end)
    }

    fn text(&mut self, token: Token) {
        let parent = self.current();
        let parent_foreign = self.document[parent].foreign;
        let end = token.location.end();
        let id = self
            .document
            .create(NodeKind::Text, String::new(), token.location);
        {
            let node = self.document.get_mut(id);
            node.text = Some(token.text);
            node.foreign = parent_foreign;
            node.end_offset = Some(end);
        }
        self.document.append_child(parent, id);
    }

    fn comment(&mut self, token: &Token, sink: &mut dyn EventSink) {
        let body = token.comment_text();
        if !body.trim_start().starts_with(DIRECTIVE_PREFIX) {
            return;
        }
        let event = self.parse_directive(token);
        self.emit(sink, event);
    }

    fn parse_directive(&self, token: &Token) -> Event {
        let body = token.comment_text();
        // Offset of the comment body inside the token text
        let body_offset = token.text.find(body).unwrap_or(0);

        let captures = DIRECTIVE_PATTERN
            .as_ref()
            .and_then(|pattern| pattern.captures(body));
        let Some(captures) = captures else {
            return Event::InvalidDirective {
                message: format!("Failed to parse directive \"{}\"", body.trim()),
                location: token.location.clone(),
            };
        };

        let action_name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Some(action) = DirectiveAction::parse(action_name) else {
            return Event::InvalidDirective {
                message: format!("Unknown directive \"html-validate-{}\"", action_name),
                location: token.location.clone(),
            };
        };

        let mut rules = Vec::new();
        if let Some(list) = captures.get(2) {
            let mut cursor = list.start();
            for item in list.as_str().split(',') {
                let leading = item.len() - item.trim_start().len();
                let id = item.trim();
                if !id.is_empty() {
                    let start = body_offset + cursor + leading;
                    rules.push(DirectiveRule {
                        id: id.to_string(),
                        location: token.location.advance(&token.text[..start], id.len()),
                    });
                }
                cursor += item.len() + 1;
            }
        }

        Event::Directive {
            action,
            rules,
            parent: self.current(),
            location: token.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn meta() -> MetaTable {
        MetaTable::html5().unwrap()
    }

    fn errors(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::ParseError { error, .. } => Some(error.to_string()),
                _ => None,
            })
            .collect()
    }

    fn count(events: &[Event], kind: crate::parser::event::EventKind) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_simple_tree() {
        let meta = meta();
        let (doc, events) = parse("<div id=\"a\"><span>hi</span></div>", "inline", &meta).unwrap();

        let div = doc.child_elements(NodeId::ROOT).next().unwrap();
        assert_eq!(div.tag_name, "div");
        assert_eq!(div.attribute("id").unwrap().value.as_deref(), Some("a"));
        assert_eq!(div.closed, Some(CloseKind::Explicit));
        assert_eq!(doc.range(div.id), Some(0..33));

        let span = doc.child_elements(div.id).next().unwrap();
        assert_eq!(span.children.len(), 1);
        assert_eq!(doc[span.children[0]].text.as_deref(), Some("hi"));

        assert_eq!(events.first(), Some(&Event::DomLoad));
        assert_eq!(events.last(), Some(&Event::DomReady));
        assert!(errors(&events).is_empty());
    }

    #[test]
    fn test_attr_event_precedes_storage() {
        struct Recorder(Vec<usize>);
        impl EventSink for Recorder {
            fn emit(&mut self, event: Event, document: &Document) {
                if let Event::Attr { target, .. } = event {
                    self.0.push(document[target].attributes.len());
                }
            }
        }

        let meta = meta();
        let mut recorder = Recorder(Vec::new());
        let mut builder = TreeBuilder::new(&meta, "inline", 20);
        for token in crate::parser::tokenize("<p a=1 b c=\"2\">", "inline") {
            builder.push(token.unwrap(), &mut recorder);
        }
        let doc = builder.finish(&mut recorder);
        assert_eq!(recorder.0, vec![0, 1, 2]);
        let p = doc.child_elements(NodeId::ROOT).next().unwrap();
        assert_eq!(p.attribute("b").unwrap().value, None);
    }

    #[test]
    fn test_incremental_state() {
        let meta = meta();
        let source = "<div><span>x</span>";
        let mut events: Vec<Event> = Vec::new();
        let mut builder = TreeBuilder::new(&meta, "inline", source.len());
        for token in crate::parser::tokenize(source, "inline") {
            builder.push(token.unwrap(), &mut events);
            assert_eq!(builder.open_elements()[0], NodeId::ROOT);
        }
        assert_eq!(builder.open_elements().len(), 2);
        assert_eq!(builder.document().elements().count(), 2);

        let doc = builder.finish(&mut events);
        assert_eq!(doc.elements().count(), 2);
        assert_eq!(errors(&events).len(), 1);
    }

    #[test]
    fn test_unclosed_element() {
        let meta = meta();
        let (doc, events) = parse("<div>", "inline", &meta).unwrap();
        assert_eq!(errors(&events), vec!["Unclosed element '<div>'"]);

        let location = events
            .iter()
            .find_map(|e| match e {
                Event::ParseError { location, .. } => Some(location.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(location.offset, 0);
        assert_eq!(doc.elements().next().unwrap().closed, Some(CloseKind::EndOfInput));
    }

    #[test]
    fn test_stray_end_tag_does_not_mutate() {
        let meta = meta();
        let (doc, events) = parse("</div>", "inline", &meta).unwrap();
        assert_eq!(errors(&events), vec!["Stray end tag '</div>'"]);
        assert_eq!(doc.len(), 1);
        assert_eq!(count(&events, crate::parser::event::EventKind::TagClose), 0);
    }

    #[test]
    fn test_mismatched_close() {
        let meta = meta();
        let (_, events) = parse("<h1></div>", "inline", &meta).unwrap();
        assert_eq!(
            errors(&events),
            vec![
                "Mismatched close-tag, expected '</h1>' but found '</div>'",
                "Unclosed element '<h1>'",
            ]
        );
    }

    #[test]
    fn test_close_pops_intermediate_elements() {
        let meta = meta();
        let (doc, events) = parse("<div><span><b></div>", "inline", &meta).unwrap();
        assert_eq!(
            errors(&events),
            vec![
                "Mismatched close-tag, expected '</b>' but found '</div>'",
                "Mismatched close-tag, expected '</span>' but found '</div>'",
            ]
        );
        assert!(doc.elements().all(|node| node.closed.is_some()));
    }

    #[test]
    fn test_implicit_close_by_sibling() {
        let meta = meta();
        let (doc, events) = parse("<ul><li>a<li>b</ul>", "inline", &meta).unwrap();
        assert!(errors(&events).is_empty());

        let ul = doc.child_elements(NodeId::ROOT).next().unwrap();
        let items: Vec<_> = doc.child_elements(ul.id).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].closed, Some(CloseKind::Implicit));

        let implicit = events
            .iter()
            .find_map(|e| match e {
                Event::TagClose {
                    target,
                    previous,
                    kind: CloseKind::Implicit,
                    ..
                } => Some((*target, *previous)),
                _ => None,
            })
            .unwrap();
        assert_eq!(implicit, (items[0].id, Some(items[1].id)));
    }

    #[test]
    fn test_void_and_self_closing() {
        let meta = meta();
        let (doc, events) = parse("<p>a<br>b<div/>c</p>", "inline", &meta).unwrap();

        let br = doc.elements().find(|n| n.tag_name == "br").unwrap();
        assert!(br.void);
        assert!(br.children.is_empty());
        assert_eq!(br.closed, Some(CloseKind::Void));

        // <div> implicitly closes <p>, so </p> has no open element left
        let div = doc.elements().find(|n| n.tag_name == "div").unwrap();
        assert!(div.self_closed);
        assert_eq!(div.closed, Some(CloseKind::SelfClosed));
        assert_eq!(errors(&events), vec!["Stray end tag '</p>'"]);
    }

    #[test]
    fn test_foreign_content_keeps_case() {
        let meta = meta();
        let (doc, events) = parse(
            "<svg><foreignObject><p></p></foreignObject><linearGradient/></svg>",
            "inline",
            &meta,
        )
        .unwrap();
        assert!(errors(&events).is_empty());

        let names: Vec<&str> = doc.elements().map(|n| n.tag_name.as_str()).collect();
        assert_eq!(names, vec!["svg", "foreignObject", "p", "linearGradient"]);
        assert!(doc.elements().all(|n| n.foreign));
        assert!(meta.for_node(doc.elements().nth(2).unwrap()).is_none());
    }

    #[test]
    fn test_text_inherits_foreign_flag() {
        let meta = meta();
        let (doc, _) = parse("<svg><text>label</text></svg><p>plain</p>", "inline", &meta).unwrap();
        let texts: Vec<(&str, bool)> = doc
            .nodes()
            .filter_map(|n| n.text.as_deref().map(|text| (text, n.foreign)))
            .collect();
        assert_eq!(texts, vec![("label", true), ("plain", false)]);
    }

    #[test]
    fn test_directive_pattern_compiles() {
        assert!(DIRECTIVE_PATTERN.is_some());
    }

    #[test]
    fn test_optional_end_tags_not_reported() {
        let meta = meta();
        let (_, events) = parse("<ul><li>one<li>two</ul><p>text", "inline", &meta).unwrap();
        assert!(errors(&events).is_empty());
    }

    #[test]
    fn test_open_close_balance() {
        let meta = meta();
        let inputs = [
            "<div><p>a<p>b</div>",
            "</span><b><i></b></i>",
            "<table><tr><td>1<td>2</table>",
            "<svg><circle></svg>",
            "<br></br><img/>",
            "text only",
            "<a><b><c>",
        ];
        for input in inputs {
            let (doc, events) = parse(input, "inline", &meta).unwrap();
            assert_eq!(
                count(&events, crate::parser::event::EventKind::TagOpen),
                count(&events, crate::parser::event::EventKind::TagClose),
                "unbalanced events for {}",
                input
            );
            assert_eq!(
                count(&events, crate::parser::event::EventKind::TagClose),
                count(&events, crate::parser::event::EventKind::ElementReady),
            );
            for node in doc.nodes().skip(1) {
                let parent = node.parent.unwrap();
                assert_eq!(
                    doc[parent].children.iter().filter(|c| **c == node.id).count(),
                    1
                );
            }
        }
    }

    #[test]
    fn test_directive_parsing() {
        let meta = meta();
        let source = "<div><!-- [html-validate-disable-next foo, bar: because] --><p></p></div>";
        let (_, events) = parse(source, "inline", &meta).unwrap();

        let (action, rules, parent) = events
            .iter()
            .find_map(|e| match e {
                Event::Directive {
                    action,
                    rules,
                    parent,
                    ..
                } => Some((*action, rules.clone(), *parent)),
                _ => None,
            })
            .unwrap();
        assert_eq!(action, DirectiveAction::DisableNext);
        assert_eq!(parent, NodeId(1));
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["foo", "bar"]);
        assert_eq!(&source[rules[0].location.offset..rules[0].location.end()], "foo");
        assert_eq!(&source[rules[1].location.offset..rules[1].location.end()], "bar");
    }

    #[test]
    fn test_directive_without_rules_and_invalid() {
        let meta = meta();
        let (_, events) = parse(
            "<!-- [html-validate-disable] --><!-- [html-validate-frobnicate foo] --><!-- plain -->",
            "inline",
            &meta,
        )
        .unwrap();

        assert!(events.iter().any(|e| matches!(
            e,
            Event::Directive { action: DirectiveAction::Disable, rules, .. } if rules.is_empty()
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::InvalidDirective { message, .. } if message.contains("html-validate-frobnicate")
        )));
    }

    #[test]
    fn test_doctype_event() {
        let meta = meta();
        let (_, events) = parse("<!DOCTYPE html><html></html>", "inline", &meta).unwrap();
        assert!(matches!(
            &events[1],
            Event::Doctype { value, .. } if value == "html"
        ));
    }
}
