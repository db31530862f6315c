//! Document Tree
//!
//! Arena-backed tree: nodes own nothing directly, children and parent are
//! stored as `NodeId`s into the document's node vector.

use std::ops::Index;

use crate::core::location::Location;
use crate::parser::lexer::Quote;

/// Stable index of a node inside its `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic container holding the top-level nodes
    Root,
    Element,
    Text,
}

/// How an element was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Matching end tag
    Explicit,
    /// Closed by a sibling or by the end tag of an ancestor
    Implicit,
    /// Written with `/>`
    SelfClosed,
    /// Void element, never has content
    Void,
    /// Still open when the input ended
    EndOfInput,
}

/// An attribute as stored on its element
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
    pub quote: Option<Quote>,
    pub key_location: Location,
    pub value_location: Option<Location>,
}

/// One node of the document
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Lowercased for HTML elements, as written for foreign elements
    pub tag_name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Text content for text nodes
    pub text: Option<String>,
    pub void: bool,
    pub self_closed: bool,
    /// Part of an SVG/MathML subtree
    pub foreign: bool,
    /// Location of the open tag (or of the text run)
    pub location: Location,
    /// Byte offset where the node ends; set when it is closed
    pub end_offset: Option<usize>,
    pub closed: Option<CloseKind>,
}

impl Node {
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    /// Attribute by name (ASCII case-insensitive)
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.key.eq_ignore_ascii_case(key))
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// `<tag>` formatted for messages
    pub fn display_name(&self) -> String {
        format!("<{}>", self.tag_name)
    }
}

/// A parsed document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    source_len: usize,
}

impl Document {
    pub fn new(root_location: Location, source_len: usize) -> Self {
        let root = Node {
            id: NodeId::ROOT,
            kind: NodeKind::Root,
            tag_name: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
            text: None,
            void: false,
            self_closed: false,
            foreign: false,
            location: root_location,
            end_offset: None,
            closed: None,
        };
        Self {
            nodes: vec![root],
            source_len,
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All element nodes in document order
    pub fn elements(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_element())
    }

    /// Allocate a detached node and return its id
    pub(crate) fn create(&mut self, kind: NodeKind, tag_name: String, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            tag_name,
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
            text: None,
            void: false,
            self_closed: false,
            foreign: false,
            location,
            end_offset: None,
            closed: None,
        });
        id
    }

    /// Attach a detached node as last child of `parent`
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.0].parent.is_none(), "node already attached");
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Store an attribute, replacing the value of an existing one
    pub(crate) fn set_attribute(&mut self, id: NodeId, attribute: Attribute) {
        let node = &mut self.nodes[id.0];
        match node
            .attributes
            .iter_mut()
            .find(|attr| attr.key.eq_ignore_ascii_case(&attribute.key))
        {
            Some(existing) => *existing = attribute,
            None => node.attributes.push(attribute),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get(id)?.parent.and_then(|parent| self.get(parent))
    }

    /// Element children of a node, skipping text
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.get(*child))
            .filter(|child| child.is_element())
    }

    /// Ancestors from the parent up to (and including) the root
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.get(id).and_then(|node| node.parent),
        }
    }

    /// Nearest ancestor element with the given tag name
    pub fn closest(&self, id: NodeId, tag_name: &str) -> Option<&Node> {
        self.ancestors(id)
            .find(|node| node.is_element() && node.tag_name.eq_ignore_ascii_case(tag_name))
    }

    /// Nesting depth, the root being 0
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Byte range covered by a node and all its descendants
    pub fn range(&self, id: NodeId) -> Option<std::ops::Range<usize>> {
        let node = self.get(id)?;
        let end = node.end_offset?;
        Some(node.location.offset..end.max(node.location.end()))
    }
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

/// Iterator over the ancestors of a node
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.document.get(self.next?)?;
        self.next = node.parent;
        Some(node)
    }
}
