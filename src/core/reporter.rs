//! Reporter
//!
//! Collects the messages of one document and turns them into the final,
//! serializable report once directives have been resolved.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::diagnostics::{Message, Severity};
use crate::core::location::Location;
use crate::parser::dom::{Document, NodeId};

/// Builds the CSS selector shown for a message
pub trait SelectorLocator: Send + Sync {
    fn selector(&self, document: &Document, node: NodeId) -> Option<String>;
}

/// `html > body > div:nth-child(2)` style paths, anchored at the closest `#id`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocator;

impl SelectorLocator for DefaultLocator {
    fn selector(&self, document: &Document, node: NodeId) -> Option<String> {
        let mut current = document.get(node)?;
        if !current.is_element() {
            return None;
        }

        let mut parts = Vec::new();
        loop {
            let id = current
                .attribute("id")
                .and_then(|attr| attr.value.as_deref())
                .filter(|id| !id.is_empty() && !id.contains(char::is_whitespace));
            if let Some(id) = id {
                parts.push(format!("#{}", id));
                break;
            }

            let mut part = current.tag_name.clone();
            let parent = current.parent.and_then(|parent| document.get(parent));
            if let Some(parent) = parent {
                let siblings: Vec<NodeId> = document.child_elements(parent.id).map(|n| n.id).collect();
                let same_tag = document
                    .child_elements(parent.id)
                    .filter(|sibling| sibling.tag_name == current.tag_name)
                    .count();
                if same_tag > 1
                    && let Some(index) = siblings.iter().position(|&id| id == current.id)
                {
                    let _ = write!(part, ":nth-child({})", index + 1);
                }
            }
            parts.push(part);

            match parent {
                Some(parent) if parent.is_element() => current = parent,
                _ => break,
            }
        }

        parts.reverse();
        Some(parts.join(" > "))
    }
}

/// A message as it appears in the result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMessage {
    pub rule_id: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub size: usize,
    pub selector: Option<String>,
    pub context: Option<serde_json::Value>,
}

impl From<Message> for ReportMessage {
    fn from(message: Message) -> Self {
        Self {
            rule_id: message.rule_id,
            severity: message.severity,
            message: message.message,
            line: message.location.line,
            column: message.location.column,
            offset: message.location.offset,
            size: message.location.size,
            selector: message.selector,
            context: message.context,
        }
    }
}

/// Result for one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub file_path: String,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub messages: Vec<ReportMessage>,
}

impl DocumentReport {
    pub fn new(file_path: &str, messages: Vec<ReportMessage>) -> Self {
        let error_count = messages
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count();
        let warning_count = messages
            .iter()
            .filter(|m| m.severity == Severity::Warn)
            .count();
        Self {
            file_path: file_path.to_string(),
            valid: error_count == 0,
            error_count,
            warning_count,
            messages,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Human readable listing, one message per line
    pub fn format_text(&self) -> String {
        let mut out = String::new();
        if self.messages.is_empty() {
            return out;
        }
        let _ = writeln!(out, "{}", self.file_path);
        for message in &self.messages {
            let _ = writeln!(
                out,
                "  {}:{}  {:<7}  {}  {}",
                message.line,
                message.column,
                message.severity.to_string(),
                message.message,
                message.rule_id.as_deref().unwrap_or_default()
            );
        }
        out
    }
}

/// Aggregated result of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub results: Vec<DocumentReport>,
}

impl Report {
    pub fn new(results: Vec<DocumentReport>) -> Self {
        Self {
            valid: results.iter().all(DocumentReport::is_valid),
            error_count: results.iter().map(|r| r.error_count).sum(),
            warning_count: results.iter().map(|r| r.warning_count).sum(),
            results,
        }
    }

    pub fn format_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&result.format_text());
        }
        let problems = self.error_count + self.warning_count;
        if problems > 0 {
            let _ = writeln!(
                out,
                "\n{} problem{} ({} error{}, {} warning{})",
                problems,
                plural(problems),
                self.error_count,
                plural(self.error_count),
                self.warning_count,
                plural(self.warning_count)
            );
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Accumulates messages for one document
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    messages: Vec<Message>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_error(&mut self, rule_id: Option<&str>, message: impl Into<String>, location: Location) {
        self.add(Message::new(rule_id, Severity::Error, message, location));
    }

    pub fn add_warning(&mut self, rule_id: Option<&str>, message: impl Into<String>, location: Location) {
        self.add(Message::new(rule_id, Severity::Warn, message, location));
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sort by position and resolve selectors of the surviving messages
    pub fn finish(
        self,
        file_path: &str,
        document: Option<&Document>,
        locator: &dyn SelectorLocator,
    ) -> DocumentReport {
        let mut messages = self.messages;
        messages.sort_by_key(|message| message.location.offset);

        let messages = messages
            .into_iter()
            .map(|mut message| {
                if let (Some(document), Some(node)) = (document, message.node) {
                    message.selector = locator.selector(document, node);
                }
                ReportMessage::from(message)
            })
            .collect();
        DocumentReport::new(file_path, messages)
    }
}
