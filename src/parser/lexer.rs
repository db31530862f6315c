//! Markup Lexer
//!
//! A small state machine that turns source text into located tokens.
//! Tokens are produced lazily, one per `next()` call; whitespace between
//! attributes is skipped rather than tokenized.

use std::sync::Arc;

use thiserror::Error;

use crate::core::location::Location;

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Token types in markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<div` or `</div`
    TagOpen,
    /// `>` or `/>`
    TagClose,
    /// Attribute name, e.g. `class`
    AttrName,
    /// Attribute value including quotes, e.g. `"foo"`
    AttrValue,
    /// Text between tags
    Text,
    /// `<!-- ... -->` or a bogus `<! ... >` / `<? ... >` comment
    Comment,
    /// `<!doctype ...>`
    Doctype,
}

/// Quoting style of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    Double,
    Single,
    Unquoted,
}

/// A token with its raw text and location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: Location,
}

impl Token {
    /// Tag name of a `TagOpen` token as written
    pub fn tag_name(&self) -> &str {
        self.text
            .strip_prefix("</")
            .or_else(|| self.text.strip_prefix('<'))
            .unwrap_or(&self.text)
    }

    /// `true` for `</name` tokens
    pub fn is_end_tag(&self) -> bool {
        self.kind == TokenKind::TagOpen && self.text.starts_with("</")
    }

    /// `true` for `/>` tokens
    pub fn is_self_closing(&self) -> bool {
        self.kind == TokenKind::TagClose && self.text == "/>"
    }

    /// Unquoted attribute value and the quoting style used
    pub fn attr_value(&self) -> (&str, Quote) {
        let text = self.text.as_str();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            (&text[1..text.len() - 1], Quote::Double)
        } else if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            (&text[1..text.len() - 1], Quote::Single)
        } else {
            (text, Quote::Unquoted)
        }
    }

    /// Comment body without delimiters
    pub fn comment_text(&self) -> &str {
        if let Some(inner) = self
            .text
            .strip_prefix("<!--")
            .and_then(|s| s.strip_suffix("-->"))
        {
            inner
        } else {
            self.text
                .get(2..self.text.len().saturating_sub(1))
                .unwrap_or_default()
        }
    }

    /// Doctype value, e.g. `html` for `<!DOCTYPE html>`
    pub fn doctype_value(&self) -> &str {
        self.text
            .get("<!doctype".len()..self.text.len().saturating_sub(1))
            .unwrap_or_default()
            .trim()
    }
}

/// Input the lexer could not classify; fatal for the current document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{message}")]
    InvalidToken { location: Location, message: String },
}

impl LexError {
    pub fn location(&self) -> &Location {
        match self {
            LexError::InvalidToken { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Text,
    TagOpen,
    TagName,
    AttributeName,
    AttributeValue,
    Comment,
    Doctype,
    RawText(String),
}

/// Tag currently being lexed
#[derive(Debug, Clone)]
struct OpenTag {
    name: String,
    closing: bool,
    start: Location,
}

/// Lazy tokenizer over a source string.
///
/// Yields `Err` at most once; the iterator is exhausted afterwards.
pub struct Lexer<'a> {
    source: &'a str,
    filename: Arc<str>,
    pos: usize,
    line: usize,
    column: usize,
    state: State,
    tag: Option<OpenTag>,
    token_start: Option<Location>,
    failed: bool,
}

/// Tokenize a complete source text
pub fn tokenize<'a>(source: &'a str, filename: &str) -> Lexer<'a> {
    Lexer::new(source, filename)
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, filename: &str) -> Self {
        Self {
            source,
            filename: Arc::from(filename),
            pos: 0,
            line: 1,
            column: 1,
            state: State::Text,
            tag: None,
            token_start: None,
            failed: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn here(&self) -> Location {
        Location::new(self.filename.clone(), self.pos, self.line, self.column, 0)
    }

    /// Advance `len` bytes and return the location of the consumed slice
    fn consume(&mut self, len: usize) -> Location {
        let start = self.here();
        for ch in self.source[self.pos..self.pos + len].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos += len;
        Location { size: len, ..start }
    }

    fn emit(&mut self, kind: TokenKind, len: usize) -> Token {
        let text = self.rest()[..len].to_string();
        let location = self.consume(len);
        Token {
            kind,
            text,
            location,
        }
    }

    fn skip_whitespace(&mut self) {
        let len = self
            .rest()
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(self.rest().len());
        self.consume(len);
    }

    fn fail(&mut self, location: Location, message: impl Into<String>) -> LexError {
        self.failed = true;
        LexError::InvalidToken {
            location,
            message: message.into(),
        }
    }

    fn unterminated_tag(&mut self) -> LexError {
        let (location, name) = match &self.tag {
            Some(tag) => (tag.start.clone(), tag.name.clone()),
            None => (self.here(), String::new()),
        };
        self.fail(location, format!("failed to tokenize: unterminated tag <{}>", name))
    }

    fn lex_text(&mut self) -> Option<Token> {
        let rest = self.rest();
        if rest.is_empty() {
            return None;
        }
        if rest.starts_with("<!--") || rest.starts_with("<?") {
            self.state = State::Comment;
            return None;
        }
        if starts_with_ignore_case(rest, "<!doctype") {
            self.state = State::Doctype;
            return None;
        }
        if rest.starts_with("<!") {
            self.state = State::Comment;
            return None;
        }
        if starts_tag(rest) {
            self.state = State::TagOpen;
            return None;
        }

        // Text runs until the next '<' that starts markup
        let mut end = rest.len();
        for (idx, _) in rest.match_indices('<').filter(|(idx, _)| *idx > 0) {
            if starts_markup(&rest[idx..]) {
                end = idx;
                break;
            }
        }
        Some(self.emit(TokenKind::Text, end))
    }

    fn lex_tag_open(&mut self) {
        let closing = self.rest().starts_with("</");
        let start = self.here();
        self.consume(if closing { 2 } else { 1 });
        self.tag = Some(OpenTag {
            name: String::new(),
            closing,
            start: start.clone(),
        });
        self.token_start = Some(start);
        self.state = State::TagName;
    }

    fn lex_tag_name(&mut self) -> Token {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')))
            .unwrap_or(rest.len());
        let name = rest[..len].to_string();
        self.consume(len);

        let mut location = self.token_start.take().unwrap_or_else(|| self.here());
        let text = self.source[location.offset..self.pos].to_string();
        location.size = text.len();
        if let Some(tag) = self.tag.as_mut() {
            tag.name = name;
        }
        self.state = State::AttributeName;
        Token {
            kind: TokenKind::TagOpen,
            text,
            location,
        }
    }

    fn lex_attribute_name(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        let rest = self.rest();
        let Some(ch) = rest.chars().next() else {
            return Err(self.unterminated_tag());
        };

        match ch {
            '>' => {
                self.state = match &self.tag {
                    Some(tag)
                        if !tag.closing
                            && RAW_TEXT_ELEMENTS
                                .iter()
                                .any(|raw| tag.name.eq_ignore_ascii_case(raw)) =>
                    {
                        State::RawText(tag.name.to_ascii_lowercase())
                    }
                    _ => State::Text,
                };
                Ok(Some(self.emit(TokenKind::TagClose, 1)))
            }
            '/' if rest.starts_with("/>") => {
                self.state = State::Text;
                Ok(Some(self.emit(TokenKind::TagClose, 2)))
            }
            '/' => {
                self.consume(1);
                Ok(None)
            }
            '"' | '\'' | '<' | '=' => {
                let location = self.here();
                Err(self.fail(
                    Location { size: 1, ..location },
                    format!("failed to tokenize: unexpected '{}' in tag", ch),
                ))
            }
            _ => {
                let len = rest
                    .find(|c: char| {
                        c.is_whitespace() || matches!(c, '>' | '/' | '=' | '"' | '\'' | '<')
                    })
                    .unwrap_or(rest.len());
                let token = self.emit(TokenKind::AttrName, len);

                let after = self.rest();
                let gap = after
                    .find(|c: char| !c.is_whitespace())
                    .unwrap_or(after.len());
                if after[gap..].starts_with('=') {
                    // `name=>` carries no value
                    let dangling = after[gap + 1..].trim_start().starts_with('>');
                    self.consume(gap + 1);
                    if !dangling {
                        self.state = State::AttributeValue;
                    }
                }
                Ok(Some(token))
            }
        }
    }

    fn lex_attribute_value(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let rest = self.rest();
        let Some(ch) = rest.chars().next() else {
            return Err(self.unterminated_tag());
        };
        self.state = State::AttributeName;

        match ch {
            '"' | '\'' => match rest[1..].find(ch) {
                Some(close) => Ok(self.emit(TokenKind::AttrValue, close + 2)),
                None => {
                    let location = self.here();
                    Err(self.fail(
                        Location {
                            size: rest.len(),
                            ..location
                        },
                        "failed to tokenize: unterminated attribute value",
                    ))
                }
            },
            _ => {
                let len = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                Ok(self.emit(TokenKind::AttrValue, len))
            }
        }
    }

    fn lex_comment(&mut self) -> Result<Token, LexError> {
        let rest = self.rest();
        self.state = State::Text;
        let len = if rest.starts_with("<!--") {
            rest[4..].find("-->").map(|idx| idx + 4 + 3)
        } else {
            rest.find('>').map(|idx| idx + 1)
        };
        match len {
            Some(len) => Ok(self.emit(TokenKind::Comment, len)),
            None => {
                let location = self.here();
                Err(self.fail(
                    Location {
                        size: rest.len(),
                        ..location
                    },
                    "failed to tokenize: unterminated comment",
                ))
            }
        }
    }

    fn lex_doctype(&mut self) -> Result<Token, LexError> {
        let rest = self.rest();
        self.state = State::Text;
        match rest.find('>') {
            Some(idx) => Ok(self.emit(TokenKind::Doctype, idx + 1)),
            None => {
                let location = self.here();
                Err(self.fail(
                    Location {
                        size: rest.len(),
                        ..location
                    },
                    "failed to tokenize: unterminated doctype",
                ))
            }
        }
    }

    fn lex_raw_text(&mut self, name: &str) -> Option<Token> {
        self.state = State::Text;
        let rest = self.rest();
        let end = find_end_tag(rest, name).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        Some(self.emit(TokenKind::Text, end))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let step = match self.state.clone() {
                State::Text => {
                    if self.rest().is_empty() {
                        return None;
                    }
                    self.lex_text().map(Ok)
                }
                State::TagOpen => {
                    self.lex_tag_open();
                    None
                }
                State::TagName => Some(Ok(self.lex_tag_name())),
                State::AttributeName => self.lex_attribute_name().transpose(),
                State::AttributeValue => Some(self.lex_attribute_value()),
                State::Comment => Some(self.lex_comment()),
                State::Doctype => Some(self.lex_doctype()),
                State::RawText(name) => self.lex_raw_text(&name).map(Ok),
            };

            if let Some(item) = step {
                return Some(item);
            }
        }
    }
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// `<name` or `</name`
fn starts_tag(rest: &str) -> bool {
    let after = rest
        .strip_prefix("</")
        .or_else(|| rest.strip_prefix('<'));
    after
        .and_then(|s| s.chars().next())
        .is_some_and(|c| c.is_ascii_alphabetic())
}

fn starts_markup(rest: &str) -> bool {
    starts_tag(rest) || rest.starts_with("<!") || rest.starts_with("<?")
}

/// Offset of `</name` (case-insensitive) terminating a raw text element
fn find_end_tag(rest: &str, name: &str) -> Option<usize> {
    rest.match_indices("</").map(|(idx, _)| idx).find(|&idx| {
        let candidate = &rest[idx + 2..];
        starts_with_ignore_case(candidate, name)
            && candidate[name.len()..]
                .chars()
                .next()
                .is_none_or(|c| c.is_whitespace() || c == '>' || c == '/')
    })
}
