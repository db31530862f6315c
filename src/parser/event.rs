//! Tree Construction Events
//!
//! The single ordered stream produced while building a document. Rules,
//! the directive tracker and debug tooling all observe the same stream.

use std::fmt;

use crate::core::location::Location;
use crate::parser::dom::{CloseKind, Document, NodeId};
use crate::parser::lexer::Quote;

/// Error-tolerant structural problems found by the tree builder
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralError {
    /// End tag without any matching open element
    StrayEndTag { tag: String },
    /// End tag that does not match the current element
    MismatchedClose { expected: String, found: String },
    /// Element still open at end of input
    UnclosedElement { tag: String },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::StrayEndTag { tag } => {
                write!(f, "Stray end tag '</{}>'", tag)
            }
            StructuralError::MismatchedClose { expected, found } => write!(
                f,
                "Mismatched close-tag, expected '</{}>' but found '</{}>'",
                expected, found
            ),
            StructuralError::UnclosedElement { tag } => {
                write!(f, "Unclosed element '<{}>'", tag)
            }
        }
    }
}

/// Parsed inline directive action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveAction {
    Enable,
    Disable,
    DisableBlock,
    DisableNext,
}

impl DirectiveAction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "enable" => Some(DirectiveAction::Enable),
            "disable" => Some(DirectiveAction::Disable),
            "disable-block" => Some(DirectiveAction::DisableBlock),
            "disable-next" => Some(DirectiveAction::DisableNext),
            _ => None,
        }
    }
}

/// A rule name inside a directive together with its own location
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveRule {
    pub id: String,
    pub location: Location,
}

/// Event emitted by the tree builder
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Parsing begins
    DomLoad,
    /// Element opened and attached to its parent
    TagOpen { target: NodeId, location: Location },
    /// Element closed; `previous` is the element that caused an implicit close
    TagClose {
        target: NodeId,
        previous: Option<NodeId>,
        kind: CloseKind,
        location: Location,
    },
    /// Element and all its children are complete
    ElementReady { target: NodeId, location: Location },
    /// Attribute parsed, emitted before it is stored on `target`
    Attr {
        target: NodeId,
        key: String,
        value: Option<String>,
        quote: Option<Quote>,
        location: Location,
        value_location: Option<Location>,
    },
    /// `<!doctype ...>`
    Doctype { value: String, location: Location },
    /// `<!-- [html-validate-...] -->`; `parent` is the element it appears in
    Directive {
        action: DirectiveAction,
        rules: Vec<DirectiveRule>,
        parent: NodeId,
        location: Location,
    },
    /// A comment that looks like a directive but cannot be parsed
    InvalidDirective { message: String, location: Location },
    /// Structural problem, `target` is the element concerned if any
    ParseError {
        error: StructuralError,
        target: Option<NodeId>,
        location: Location,
    },
    /// Parsing finished, the tree is complete
    DomReady,
}

/// Discriminant used for rule subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DomLoad,
    TagOpen,
    TagClose,
    ElementReady,
    Attr,
    Doctype,
    Directive,
    InvalidDirective,
    ParseError,
    DomReady,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::DomLoad => EventKind::DomLoad,
            Event::TagOpen { .. } => EventKind::TagOpen,
            Event::TagClose { .. } => EventKind::TagClose,
            Event::ElementReady { .. } => EventKind::ElementReady,
            Event::Attr { .. } => EventKind::Attr,
            Event::Doctype { .. } => EventKind::Doctype,
            Event::Directive { .. } => EventKind::Directive,
            Event::InvalidDirective { .. } => EventKind::InvalidDirective,
            Event::ParseError { .. } => EventKind::ParseError,
            Event::DomReady => EventKind::DomReady,
        }
    }

    /// Location carried by the event payload itself
    pub fn location(&self) -> Option<&Location> {
        match self {
            Event::DomLoad | Event::DomReady => None,
            Event::TagOpen { location, .. }
            | Event::TagClose { location, .. }
            | Event::ElementReady { location, .. }
            | Event::Attr { location, .. }
            | Event::Doctype { location, .. }
            | Event::Directive { location, .. }
            | Event::InvalidDirective { location, .. }
            | Event::ParseError { location, .. } => Some(location),
        }
    }

    /// Node the event is about, if any
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Event::TagOpen { target, .. }
            | Event::TagClose { target, .. }
            | Event::ElementReady { target, .. }
            | Event::Attr { target, .. } => Some(*target),
            Event::ParseError { target, .. } => *target,
            _ => None,
        }
    }
}

/// Receiver of tree builder events.
///
/// The document is passed alongside each event in the state it has at
/// emission time.
pub trait EventSink {
    fn emit(&mut self, event: Event, document: &Document);
}

/// Records events for debugging and tests
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event, _document: &Document) {
        self.push(event);
    }
}
