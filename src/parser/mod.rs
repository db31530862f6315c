//! Markup Parser
//!
//! Lexing and tree construction. The lexer yields located tokens, the tree
//! builder turns them into an arena document while emitting the event
//! stream every rule observes.

pub mod builder;
pub mod dom;
pub mod event;
pub mod lexer;

pub use builder::TreeBuilder;
pub use dom::{Attribute, CloseKind, Document, Node, NodeId, NodeKind};
pub use event::{DirectiveAction, DirectiveRule, Event, EventKind, EventSink, StructuralError};
pub use lexer::{tokenize, LexError, Lexer, Quote, Token, TokenKind};

use crate::elements::MetaTable;

/// Build a document and record its event stream.
///
/// Stops at the first lexer error, which is fatal for the document.
pub fn parse(
    source: &str,
    filename: &str,
    meta: &MetaTable,
) -> Result<(Document, Vec<Event>), LexError> {
    let mut events = Vec::new();
    let document = parse_into(source, filename, meta, &mut events)?;
    Ok((document, events))
}

/// Build a document, streaming events into `sink`
pub fn parse_into(
    source: &str,
    filename: &str,
    meta: &MetaTable,
    sink: &mut dyn EventSink,
) -> Result<Document, LexError> {
    let mut builder = TreeBuilder::new(meta, filename, source.len());
    for token in tokenize(source, filename) {
        builder.push(token?, sink);
    }
    Ok(builder.finish(sink))
}
