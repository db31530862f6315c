//! Attribute rules
//!
//! All of these observe `Attr` events, which fire before the attribute is
//! stored, so the node still shows the attributes parsed so far.

use serde::Deserialize;

use super::{parse_options, Rule, RuleContext, RuleRegistry};
use crate::config::ConfigError;
use crate::parser::event::{Event, EventKind};
use crate::parser::lexer::Quote;

pub(super) fn register(registry: &mut RuleRegistry) {
    registry.register("no-dup-attr", |_, _| Ok(Box::new(NoDupAttr)));
    registry.register("attr-quotes", |id, options| {
        AttrQuotes::new(id, options).map(|rule| Box::new(rule) as Box<dyn Rule>)
    });
    registry.register("no-inline-style", |_, _| Ok(Box::new(NoInlineStyle)));
}

/// Flags an attribute given more than once on the same element
#[derive(Debug, Clone)]
pub struct NoDupAttr;

impl Rule for NoDupAttr {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Attr]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::Attr { target, key, .. } = event else {
            return;
        };
        if cx.document[*target].has_attribute(key) {
            cx.report(
                Some(*target),
                format!("Attribute \"{}\" duplicated", key.to_ascii_lowercase()),
            );
        }
    }
}

/// Preferred quote character
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    Double,
    Single,
    Any,
}

/// Options of `attr-quotes`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttrQuotesOptions {
    pub style: QuoteStyle,
    /// Allow values without quotes
    pub unquoted: bool,
}

/// Enforces a consistent quoting style for attribute values
#[derive(Debug, Clone)]
pub struct AttrQuotes {
    options: AttrQuotesOptions,
}

impl AttrQuotes {
    pub fn new(id: &str, options: Option<&toml::Value>) -> Result<Self, ConfigError> {
        Ok(Self {
            options: parse_options(id, options)?,
        })
    }

    fn problem(&self, key: &str, quote: Quote) -> Option<String> {
        match (quote, self.options.style) {
            (Quote::Unquoted, _) if !self.options.unquoted => {
                Some(format!("Attribute \"{}\" using unquoted value", key))
            }
            (Quote::Single, QuoteStyle::Double) => Some(format!(
                "Attribute \"{}\" used ' instead of expected \"",
                key
            )),
            (Quote::Double, QuoteStyle::Single) => Some(format!(
                "Attribute \"{}\" used \" instead of expected '",
                key
            )),
            _ => None,
        }
    }
}

impl Rule for AttrQuotes {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Attr]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::Attr {
            target,
            key,
            quote: Some(quote),
            value_location,
            ..
        } = event
        else {
            return;
        };
        if let Some(message) = self.problem(key, *quote) {
            match value_location {
                Some(location) => cx.report_at(Some(*target), message, location.clone()),
                None => cx.report(Some(*target), message),
            }
        }
    }
}

/// Disallows the `style` attribute
#[derive(Debug, Clone)]
pub struct NoInlineStyle;

impl Rule for NoInlineStyle {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Attr]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        if let Event::Attr { target, key, .. } = event
            && key.eq_ignore_ascii_case("style")
        {
            cx.report(Some(*target), "Inline style is not allowed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::{Message, Severity};
    use crate::elements::MetaTable;
    use crate::parser::{parse_into, Document, EventSink};

    /// Delivers attribute events while the tree is still being built
    struct Harness<'a> {
        rule: &'a mut dyn Rule,
        meta: &'a MetaTable,
        messages: Vec<Message>,
    }

    impl EventSink for Harness<'_> {
        fn emit(&mut self, event: Event, document: &Document) {
            if event.kind() != EventKind::Attr {
                return;
            }
            let mut cx = RuleContext::new(
                "test",
                Severity::Error,
                document,
                self.meta,
                event.location(),
                &mut self.messages,
            );
            self.rule.handle(&event, &mut cx);
        }
    }

    fn run(rule: &mut dyn Rule, source: &str) -> Vec<Message> {
        let meta = MetaTable::html5().unwrap();
        let mut harness = Harness {
            rule,
            meta: &meta,
            messages: Vec::new(),
        };
        parse_into(source, "inline", &meta, &mut harness).unwrap();
        harness.messages
    }

    #[test]
    fn test_duplicate_attribute() {
        let messages = run(&mut NoDupAttr, "<p id=\"a\" class=\"b\" ID=\"c\"></p><p id=\"d\"></p>");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "Attribute \"id\" duplicated");
        assert_eq!(messages[0].location.offset, 20);
    }

    #[test]
    fn test_attr_quotes_default() {
        let mut rule = AttrQuotes::new("attr-quotes", None).unwrap();
        let messages = run(&mut rule, "<p a=\"1\" b='2' c=3 d></p>");
        let texts: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Attribute \"b\" used ' instead of expected \"",
                "Attribute \"c\" using unquoted value",
            ]
        );
        assert_eq!(messages[0].location.offset, 11);
    }

    #[test]
    fn test_attr_quotes_ignores_dangling_equals() {
        let mut rule = AttrQuotes::new("attr-quotes", None).unwrap();
        assert!(run(&mut rule, "<a href=></a>").is_empty());
    }

    #[test]
    fn test_attr_quotes_options() {
        let options: toml::Value = toml::from_str("style = \"any\"\nunquoted = true").unwrap();
        let mut rule = AttrQuotes::new("attr-quotes", Some(&options)).unwrap();
        assert!(run(&mut rule, "<p a=\"1\" b='2' c=3></p>").is_empty());

        let options: toml::Value = toml::from_str("style = \"single\"").unwrap();
        let mut rule = AttrQuotes::new("attr-quotes", Some(&options)).unwrap();
        assert_eq!(run(&mut rule, "<p a=\"1\" b='2'></p>").len(), 1);

        let options: toml::Value = toml::from_str("style = \"smart\"").unwrap();
        assert!(AttrQuotes::new("attr-quotes", Some(&options)).is_err());
    }

    #[test]
    fn test_no_inline_style() {
        let messages = run(&mut NoInlineStyle, "<div STYLE=\"color: red\"></div>");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].location.offset, 5);
    }
}
