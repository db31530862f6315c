//! Element Metadata Registry
//!
//! Read-only table of element metadata. Built once per run from the
//! embedded HTML5 table and any configured custom elements, then shared.

use std::collections::{BTreeMap, HashMap};

use super::schema::{ElementDef, ElementsFile, MetaElement};
use crate::config::ConfigError;
use crate::parser::dom::Node;

/// Embedded HTML5 element table
const HTML5_ELEMENTS: &str = include_str!("../../resources/elements/html5.toml");

/// Resolved element metadata by tag name
#[derive(Debug, Clone, Default)]
pub struct MetaTable {
    elements: HashMap<String, MetaElement>,
}

impl MetaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in HTML5 elements only
    pub fn html5() -> Result<Self, ConfigError> {
        Self::html5_with(BTreeMap::new())
    }

    /// Built-in HTML5 elements extended by custom definitions.
    ///
    /// A custom entry named like a built-in element is merged over it.
    pub fn html5_with(custom: BTreeMap<String, ElementDef>) -> Result<Self, ConfigError> {
        let file: ElementsFile =
            toml::from_str(HTML5_ELEMENTS).map_err(|err| ConfigError::InvalidMetadata {
                source_name: "built-in html5 elements".to_string(),
                message: err.to_string(),
            })?;

        let mut definitions = file.elements;
        for (name, def) in custom {
            let name = name.to_ascii_lowercase();
            let def = match definitions.get(&name) {
                Some(builtin) if def.inherits.is_none() => def.merged_over(builtin),
                _ => def,
            };
            definitions.insert(name, def);
        }

        Self::from_definitions(definitions)
    }

    /// Resolve inheritance and build the lookup table
    pub fn from_definitions(definitions: BTreeMap<String, ElementDef>) -> Result<Self, ConfigError> {
        let mut resolved: BTreeMap<String, ElementDef> = BTreeMap::new();
        for name in definitions.keys() {
            let mut chain = Vec::new();
            resolve_definition(name, &definitions, &mut resolved, &mut chain)?;
        }

        let elements = resolved
            .into_iter()
            .map(|(name, def)| {
                let meta = def.into_meta(&name);
                (name, meta)
            })
            .collect::<HashMap<_, _>>();

        log::debug!("loaded metadata for {} elements", elements.len());
        Ok(Self { elements })
    }

    /// Metadata for a tag name, `None` for unknown elements
    pub fn resolve(&self, tag_name: &str) -> Option<&MetaElement> {
        self.elements
            .get(tag_name)
            .or_else(|| self.elements.get(&tag_name.to_ascii_lowercase()))
    }

    /// Metadata for a document node.
    ///
    /// Elements below the root of a foreign subtree never resolve.
    pub fn for_node(&self, node: &Node) -> Option<&MetaElement> {
        if !node.is_element() {
            return None;
        }
        let meta = self.resolve(&node.tag_name)?;
        if node.foreign && !meta.foreign {
            return None;
        }
        Some(meta)
    }

    pub fn contains(&self, tag_name: &str) -> bool {
        self.resolve(tag_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element names in sorted order
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.elements.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Resolve one definition, following `inherits` transitively
fn resolve_definition(
    name: &str,
    definitions: &BTreeMap<String, ElementDef>,
    resolved: &mut BTreeMap<String, ElementDef>,
    chain: &mut Vec<String>,
) -> Result<ElementDef, ConfigError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if chain.iter().any(|seen| seen == name) {
        chain.push(name.to_string());
        return Err(ConfigError::InheritanceCycle {
            chain: chain.join(" -> "),
        });
    }

    let def = definitions
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownInherit {
            element: chain.last().cloned().unwrap_or_default(),
            base: name.to_string(),
        })?;

    let merged = match def.inherits.clone() {
        Some(base_name) => {
            chain.push(name.to_string());
            let base = resolve_definition(&base_name, definitions, resolved, chain)?;
            chain.pop();
            def.merged_over(&base)
        }
        None => def,
    };

    resolved.insert(name.to_string(), merged.clone());
    Ok(merged)
}
