//! Diagnostics
//!
//! Messages produced by rules and by the pipeline itself.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::core::location::Location;
use crate::parser::dom::NodeId;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Disabled = 0,
    Warn = 1,
    Error = 2,
}

impl Severity {
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Severity::Disabled),
            1 => Some(Severity::Warn),
            2 => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn is_enabled(self) -> bool {
        self != Severity::Disabled
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "disabled" | "0" => Ok(Severity::Disabled),
            "warn" | "warning" | "1" => Ok(Severity::Warn),
            "error" | "2" => Ok(Severity::Error),
            other => Err(format!(
                "invalid severity '{}', expected off, warn, error or 0-2",
                other
            )),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Disabled => "off",
            Severity::Warn => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// Serialized as its numeric level
impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Reporting rule, `None` for parser failures and directive errors
    pub rule_id: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    /// Node the message refers to, used to build the selector
    pub node: Option<NodeId>,
    /// Opaque payload for documentation lookup
    pub context: Option<serde_json::Value>,
    /// Filled in when the report is finalized
    pub selector: Option<String>,
}

impl Message {
    pub fn new(
        rule_id: Option<&str>,
        severity: Severity,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            rule_id: rule_id.map(str::to_string),
            severity,
            message: message.into(),
            location,
            node: None,
            context: None,
            selector: None,
        }
    }

    pub fn with_node(mut self, node: Option<NodeId>) -> Self {
        self.node = node;
        self
    }

    pub fn with_context(mut self, context: Option<serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Join alternatives the way a sentence would: "a, b or c"
pub fn natural_join<S: AsRef<str>>(items: &[S], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [single] => single.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} {} {}", head.join(", "), conjunction, last.as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parsing() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("Warn".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!("off".parse::<Severity>(), Ok(Severity::Disabled));
        assert_eq!("2".parse::<Severity>(), Ok(Severity::Error));
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!(Severity::from_level(1), Some(Severity::Warn));
        assert_eq!(Severity::from_level(3), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warn);
        assert!(!Severity::Disabled.is_enabled());
        assert_eq!(Severity::Error.level(), 2);
    }

    #[test]
    fn test_natural_join() {
        assert_eq!(natural_join::<&str>(&[], "or"), "");
        assert_eq!(natural_join(&["foo"], "or"), "foo");
        assert_eq!(natural_join(&["foo", "bar"], "or"), "foo or bar");
        assert_eq!(natural_join(&["foo", "bar", "baz"], "or"), "foo, bar or baz");
        assert_eq!(natural_join(&["a", "b", "c"], "and"), "a, b and c");
    }
}
