//! Content-Model Validator
//!
//! Pure checks of element nesting against the metadata table. Each
//! function inspects one node (or the children of one node) and returns
//! the violations found; the rules decide how to report them.
//!
//! Nodes without metadata never violate anything, in either role.

use serde_json::json;

use crate::core::diagnostics::natural_join;
use crate::elements::{MetaElement, MetaTable, Permitted};
use crate::parser::dom::{Document, Node, NodeId};

/// A content-model problem attached to a node
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub node: NodeId,
    pub message: String,
    pub context: serde_json::Value,
}

impl Violation {
    fn new(node: NodeId, message: String, context: serde_json::Value) -> Self {
        Self {
            node,
            message,
            context,
        }
    }
}

/// Whether a tag name or `@category` pattern matches a node
pub fn matches_pattern(pattern: &str, node: &Node, meta: Option<&MetaElement>) -> bool {
    match pattern.strip_prefix('@') {
        Some(category) => meta.is_some_and(|meta| meta.has_category(category)),
        None => node.tag_name.eq_ignore_ascii_case(pattern),
    }
}

/// Outcome of matching a node against a permitted list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermittedResult {
    Allowed,
    /// Matched an exclusion
    Excluded(String),
    /// Inclusions exist and none matched
    NotIncluded,
}

/// Evaluate a permitted list: exclusions first, then inclusions
pub fn check_permitted(rules: &[Permitted], node: &Node, meta: Option<&MetaElement>) -> PermittedResult {
    for rule in rules {
        if let Permitted::Exclude(pattern) = rule
            && matches_pattern(pattern, node, meta)
        {
            return PermittedResult::Excluded(pattern.clone());
        }
    }

    let mut includes = rules
        .iter()
        .filter_map(|rule| match rule {
            Permitted::Include(pattern) => Some(pattern),
            Permitted::Exclude(_) => None,
        })
        .peekable();
    if includes.peek().is_none() {
        return PermittedResult::Allowed;
    }
    if includes.any(|pattern| matches_pattern(pattern, node, meta)) {
        PermittedResult::Allowed
    } else {
        PermittedResult::NotIncluded
    }
}

/// `<tag>` for tag names, `@category` as written
pub fn describe_pattern(pattern: &str) -> String {
    if pattern.starts_with('@') {
        pattern.to_string()
    } else {
        format!("<{}>", pattern)
    }
}

/// Element children paired with their metadata, skipping unknown elements
fn known_children<'a>(
    document: &'a Document,
    table: &'a MetaTable,
    parent: NodeId,
) -> impl Iterator<Item = (&'a Node, &'a MetaElement)> {
    document
        .child_elements(parent)
        .filter_map(move |child| table.for_node(child).map(|meta| (child, meta)))
}

/// Children of `parent` not allowed by its permitted content
pub fn permitted_content(document: &Document, table: &MetaTable, parent: NodeId) -> Vec<Violation> {
    let Some(parent_node) = document.get(parent) else {
        return Vec::new();
    };
    let Some(parent_meta) = table.for_node(parent_node) else {
        return Vec::new();
    };
    if parent_meta.permitted_content.is_empty() {
        return Vec::new();
    }

    known_children(document, table, parent)
        .filter(|(child, meta)| {
            check_permitted(&parent_meta.permitted_content, child, Some(*meta))
                != PermittedResult::Allowed
        })
        .map(|(child, _)| {
            Violation::new(
                child.id,
                format!(
                    "{} element is not permitted as content under {}",
                    child.display_name(),
                    parent_node.display_name()
                ),
                json!({ "kind": "content", "child": child.tag_name, "parent": parent_node.tag_name }),
            )
        })
        .collect()
}

/// Check `node` against its own permitted parent list
pub fn permitted_parent(document: &Document, table: &MetaTable, node: NodeId) -> Option<Violation> {
    let child = document.get(node)?;
    let meta = table.for_node(child)?;
    if meta.permitted_parent.is_empty() {
        return None;
    }
    let parent = document.parent(node)?;
    if parent.is_root() {
        return None;
    }
    let parent_meta = table.for_node(parent)?;

    match check_permitted(&meta.permitted_parent, parent, Some(parent_meta)) {
        PermittedResult::Allowed => None,
        PermittedResult::Excluded(_) => Some(Violation::new(
            node,
            format!(
                "{} element is not permitted as a child of {}",
                child.display_name(),
                parent.display_name()
            ),
            json!({ "kind": "parent", "child": child.tag_name, "parent": parent.tag_name }),
        )),
        PermittedResult::NotIncluded => {
            let alternatives: Vec<String> = meta
                .permitted_parent
                .iter()
                .filter_map(|rule| match rule {
                    Permitted::Include(pattern) => Some(describe_pattern(pattern)),
                    Permitted::Exclude(_) => None,
                })
                .collect();
            Some(Violation::new(
                node,
                format!(
                    "{} element requires a {} element as parent",
                    child.display_name(),
                    natural_join(&alternatives, "or")
                ),
                json!({ "kind": "parent", "child": child.tag_name, "parent": parent.tag_name }),
            ))
        }
    }
}

/// Rank of a node in an order list: index of the first matching group
fn order_rank(groups: &[Vec<String>], node: &Node, meta: &MetaElement) -> Option<usize> {
    groups.iter().position(|group| {
        group
            .iter()
            .any(|pattern| matches_pattern(pattern, node, Some(meta)))
    })
}

/// Children appearing after an element they must precede
pub fn permitted_order(document: &Document, table: &MetaTable, parent: NodeId) -> Vec<Violation> {
    let Some(parent_meta) = document.get(parent).and_then(|node| table.for_node(node)) else {
        return Vec::new();
    };
    let groups = &parent_meta.permitted_order;
    if groups.is_empty() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    let mut highest: Option<(usize, &Node)> = None;
    for (child, meta) in known_children(document, table, parent) {
        let Some(rank) = order_rank(groups, child, meta) else {
            continue;
        };
        match highest {
            Some((max, first)) if rank < max => violations.push(Violation::new(
                child.id,
                format!(
                    "Element {} must be used before {} in this context",
                    child.display_name(),
                    first.display_name()
                ),
                json!({ "kind": "order", "child": child.tag_name, "before": first.tag_name }),
            )),
            Some((max, _)) if rank == max => {}
            _ => highest = Some((rank, child)),
        }
    }
    violations
}

/// Every occurrence beyond the allowed maximum
pub fn permitted_occurrences(document: &Document, table: &MetaTable, parent: NodeId) -> Vec<Violation> {
    let Some(parent_node) = document.get(parent) else {
        return Vec::new();
    };
    let Some(parent_meta) = table.for_node(parent_node) else {
        return Vec::new();
    };

    let mut violations = Vec::new();
    for (pattern, &max) in &parent_meta.permitted_occurrences {
        let matching = known_children(document, table, parent)
            .filter(|(child, meta)| matches_pattern(pattern, child, Some(*meta)));
        for (child, _) in matching.skip(max) {
            let limit = if max == 1 {
                "once".to_string()
            } else {
                format!("at most {} times", max)
            };
            violations.push(Violation::new(
                child.id,
                format!(
                    "Element {} can only appear {} under {}",
                    child.display_name(),
                    limit,
                    parent_node.display_name()
                ),
                json!({ "kind": "occurrences", "child": child.tag_name, "max": max }),
            ));
        }
    }
    violations
}

/// One violation per required child pattern with no match
pub fn required_content(document: &Document, table: &MetaTable, node: NodeId) -> Vec<Violation> {
    let Some(element) = document.get(node) else {
        return Vec::new();
    };
    let Some(meta) = table.for_node(element) else {
        return Vec::new();
    };

    meta.required_content
        .iter()
        .filter(|pattern| {
            !document
                .child_elements(node)
                .any(|child| matches_pattern(pattern, child, table.for_node(child)))
        })
        .map(|pattern| {
            Violation::new(
                node,
                format!(
                    "{} element must have {} as content",
                    element.display_name(),
                    describe_pattern(pattern)
                ),
                json!({ "kind": "required-content", "element": element.tag_name, "missing": pattern }),
            )
        })
        .collect()
}

/// A single violation when no ancestor matches any required alternative
pub fn required_ancestors(document: &Document, table: &MetaTable, node: NodeId) -> Option<Violation> {
    let element = document.get(node)?;
    let meta = table.for_node(element)?;
    if meta.required_ancestors.is_empty() {
        return None;
    }

    let satisfied = document
        .ancestors(node)
        .filter(|ancestor| ancestor.is_element())
        .any(|ancestor| {
            meta.required_ancestors
                .iter()
                .any(|pattern| matches_pattern(pattern, ancestor, table.for_node(ancestor)))
        });
    if satisfied {
        return None;
    }

    let alternatives: Vec<String> = meta
        .required_ancestors
        .iter()
        .map(|pattern| describe_pattern(pattern))
        .collect();
    Some(Violation::new(
        node,
        format!(
            "{} element requires a {} ancestor",
            element.display_name(),
            natural_join(&alternatives, "or")
        ),
        json!({ "kind": "required-ancestor", "element": element.tag_name, "ancestors": meta.required_ancestors }),
    ))
}

/// One violation per missing required attribute
pub fn required_attributes(document: &Document, table: &MetaTable, node: NodeId) -> Vec<Violation> {
    let Some(element) = document.get(node) else {
        return Vec::new();
    };
    let Some(meta) = table.for_node(element) else {
        return Vec::new();
    };

    meta.required_attributes
        .iter()
        .filter(|attr| !element.has_attribute(attr))
        .map(|attr| {
            Violation::new(
                node,
                format!(
                    "{} is missing required \"{}\" attribute",
                    element.display_name(),
                    attr
                ),
                json!({ "kind": "required-attribute", "element": element.tag_name, "attribute": attr }),
            )
        })
        .collect()
}
