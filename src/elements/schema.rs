//! Element Metadata Schema
//!
//! `ElementDef` mirrors the TOML layout where every field is optional so
//! entries can inherit from one another; `MetaElement` is the resolved,
//! lookup-ready form.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Root of an element metadata file (matches TOML)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ElementsFile {
    #[serde(default)]
    pub elements: BTreeMap<String, ElementDef>,
}

/// Element definition as written in TOML
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ElementDef {
    pub inherits: Option<String>,
    pub categories: Option<Vec<String>>,
    pub void: Option<bool>,
    pub foreign: Option<bool>,
    pub optional_end: Option<bool>,
    pub implicit_closed: Option<Vec<String>>,
    pub permitted_content: Option<Vec<PermittedEntry>>,
    pub permitted_parent: Option<Vec<PermittedEntry>>,
    pub permitted_order: Option<Vec<String>>,
    pub permitted_occurrences: Option<BTreeMap<String, usize>>,
    pub required_content: Option<Vec<String>>,
    pub required_ancestors: Option<Vec<String>>,
    pub required_attributes: Option<Vec<String>>,
    pub deprecated: Option<DeprecatedDef>,
}

/// Entry of a permitted content/parent list
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PermittedEntry {
    /// Tag name or `@category`
    Include(String),
    /// `{ exclude = "..." }`
    Exclude { exclude: String },
}

/// Deprecation as written in TOML: `true`, a message, or a table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DeprecatedDef {
    Flag(bool),
    Message(String),
    Detailed {
        message: Option<String>,
        documentation: Option<String>,
        source: Option<String>,
    },
}

/// Resolved permitted rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permitted {
    Include(String),
    Exclude(String),
}

/// Resolved deprecation details
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deprecated {
    pub message: Option<String>,
    pub documentation: Option<String>,
    pub source: Option<String>,
}

/// Runtime element metadata (optimized for lookups)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaElement {
    pub tag_name: String,
    pub categories: BTreeSet<String>,
    pub void: bool,
    pub foreign: bool,
    pub optional_end: bool,
    pub implicit_closed: Vec<String>,
    pub permitted_content: Vec<Permitted>,
    pub permitted_parent: Vec<Permitted>,
    /// Rank groups; alternatives inside a group share a rank
    pub permitted_order: Vec<Vec<String>>,
    pub permitted_occurrences: BTreeMap<String, usize>,
    pub required_content: Vec<String>,
    pub required_ancestors: Vec<String>,
    pub required_attributes: Vec<String>,
    pub deprecated: Option<Deprecated>,
}

impl ElementDef {
    /// Fill every unset field from `base`
    pub fn merged_over(self, base: &ElementDef) -> ElementDef {
        ElementDef {
            inherits: self.inherits,
            categories: self.categories.or_else(|| base.categories.clone()),
            void: self.void.or(base.void),
            foreign: self.foreign.or(base.foreign),
            optional_end: self.optional_end.or(base.optional_end),
            implicit_closed: self
                .implicit_closed
                .or_else(|| base.implicit_closed.clone()),
            permitted_content: self
                .permitted_content
                .or_else(|| base.permitted_content.clone()),
            permitted_parent: self
                .permitted_parent
                .or_else(|| base.permitted_parent.clone()),
            permitted_order: self
                .permitted_order
                .or_else(|| base.permitted_order.clone()),
            permitted_occurrences: self
                .permitted_occurrences
                .or_else(|| base.permitted_occurrences.clone()),
            required_content: self
                .required_content
                .or_else(|| base.required_content.clone()),
            required_ancestors: self
                .required_ancestors
                .or_else(|| base.required_ancestors.clone()),
            required_attributes: self
                .required_attributes
                .or_else(|| base.required_attributes.clone()),
            deprecated: self.deprecated.or_else(|| base.deprecated.clone()),
        }
    }

    /// Convert a fully merged definition into its runtime form
    pub fn into_meta(self, tag_name: &str) -> MetaElement {
        let permitted = |entries: Option<Vec<PermittedEntry>>| -> Vec<Permitted> {
            entries
                .unwrap_or_default()
                .into_iter()
                .map(|entry| match entry {
                    PermittedEntry::Include(pattern) => Permitted::Include(pattern),
                    PermittedEntry::Exclude { exclude } => Permitted::Exclude(exclude),
                })
                .collect()
        };

        let deprecated = match self.deprecated {
            None | Some(DeprecatedDef::Flag(false)) => None,
            Some(DeprecatedDef::Flag(true)) => Some(Deprecated::default()),
            Some(DeprecatedDef::Message(message)) => Some(Deprecated {
                message: Some(message),
                ..Deprecated::default()
            }),
            Some(DeprecatedDef::Detailed {
                message,
                documentation,
                source,
            }) => Some(Deprecated {
                message,
                documentation,
                source,
            }),
        };

        MetaElement {
            tag_name: tag_name.to_string(),
            categories: self.categories.unwrap_or_default().into_iter().collect(),
            void: self.void.unwrap_or(false),
            foreign: self.foreign.unwrap_or(false),
            optional_end: self.optional_end.unwrap_or(false),
            implicit_closed: self.implicit_closed.unwrap_or_default(),
            permitted_content: permitted(self.permitted_content),
            permitted_parent: permitted(self.permitted_parent),
            permitted_order: self
                .permitted_order
                .unwrap_or_default()
                .iter()
                .map(|group| {
                    group
                        .split(',')
                        .map(|alt| alt.trim().to_string())
                        .filter(|alt| !alt.is_empty())
                        .collect()
                })
                .collect(),
            permitted_occurrences: self.permitted_occurrences.unwrap_or_default(),
            required_content: self.required_content.unwrap_or_default(),
            required_ancestors: self.required_ancestors.unwrap_or_default(),
            required_attributes: self.required_attributes.unwrap_or_default(),
            deprecated,
        }
    }
}

impl MetaElement {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Whether `tag` starting as a sibling closes this element implicitly
    pub fn is_implicitly_closed_by(&self, tag: &str) -> bool {
        self.implicit_closed
            .iter()
            .any(|closer| closer.eq_ignore_ascii_case(tag))
    }
}
