//! Tree nodes: segments, loops, tables and their fields
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Values that can be stored in data elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Text value (escape sequences already resolved)
    String(String),

    /// Raw bytes from a binary-carrying segment
    Binary(Vec<u8>),

    /// Null/empty value
    Null,
}

impl Value {
    /// Borrow the text of a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Binary(_) | Value::Null => None,
        }
    }

    /// Check if value is null or empty text
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Binary(b) => b.is_empty(),
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        match self {
            Value::String(s) => s.chars().count(),
            Value::Binary(b) => b.len(),
            Value::Null => 0,
        }
    }

    /// Alias of [`Value::is_null`]
    pub fn is_empty(&self) -> bool {
        self.is_null()
    }
}

/// A simple data element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataElement {
    /// Data dictionary id (e.g. `0062`)
    pub id: String,
    /// XML tag / short name
    pub name: String,
    /// 1-based position within the segment or composite
    pub position: usize,
    /// Element value
    pub value: Value,
}

impl DataElement {
    /// Create a text data element
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        position: usize,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            value: Value::String(text.into()),
        }
    }

    /// Create a binary data element
    pub fn binary(id: impl Into<String>, name: impl Into<String>, position: usize, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            value: Value::Binary(bytes),
        }
    }

    /// Text of the element, empty for binary/null values
    pub fn text(&self) -> &str {
        self.value.as_str().unwrap_or("")
    }
}

/// A composite element made of positioned components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeElement {
    pub id: String,
    pub name: String,
    pub position: usize,
    /// Components keyed by 1-based position
    pub components: BTreeMap<usize, DataElement>,
}

impl CompositeElement {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            components: BTreeMap::new(),
        }
    }

    /// Insert a component at its position
    pub fn set_component(&mut self, element: DataElement) -> &mut Self {
        self.components.insert(element.position, element);
        self
    }

    /// Text of the component at `position`
    pub fn component(&self, position: usize) -> Option<&str> {
        self.components.get(&position).map(DataElement::text)
    }
}

/// A positioned field of a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    Data(DataElement),
    Composite(CompositeElement),
}

impl Field {
    pub fn position(&self) -> usize {
        match self {
            Field::Data(d) => d.position,
            Field::Composite(c) => c.position,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Field::Data(d) => &d.id,
            Field::Composite(c) => &c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Data(d) => &d.name,
            Field::Composite(c) => &c.name,
        }
    }

    /// Text of a simple field, or of the first component of a composite
    pub fn text(&self) -> &str {
        match self {
            Field::Data(d) => d.text(),
            Field::Composite(c) => c.components.values().next().map_or("", DataElement::text),
        }
    }
}

/// One parsed segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment tag
    pub id: String,
    /// XML tag / short name
    pub name: String,
    /// 1-based position of the segment in the interchange
    pub position: usize,
    /// Byte offset of the segment start in the source
    pub byte_offset: usize,
    /// Fields keyed by 1-based position; empty fields are absent
    pub fields: BTreeMap<usize, Field>,
}

impl Segment {
    /// Create an empty segment
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position: 0,
            byte_offset: 0,
            fields: BTreeMap::new(),
        }
    }

    /// Record where the segment was read from
    pub fn at(mut self, position: usize, byte_offset: usize) -> Self {
        self.position = position;
        self.byte_offset = byte_offset;
        self
    }

    /// Insert a field at its position
    pub fn set_field(&mut self, field: Field) -> &mut Self {
        self.fields.insert(field.position(), field);
        self
    }

    /// Field at `position`
    pub fn field(&self, position: usize) -> Option<&Field> {
        self.fields.get(&position)
    }

    /// Text of the simple field (or first component) at `position`
    pub fn text(&self, position: usize) -> Option<&str> {
        self.field(position).map(Field::text)
    }

    /// Text of component `component` of the composite at `position`.
    ///
    /// A simple field answers for component 1.
    pub fn component(&self, position: usize, component: usize) -> Option<&str> {
        match self.field(position)? {
            Field::Composite(c) => c.component(component),
            Field::Data(d) if component == 1 => Some(d.text()),
            Field::Data(_) => None,
        }
    }

    /// Highest populated field position
    pub fn last_position(&self) -> usize {
        self.fields.keys().next_back().copied().unwrap_or(0)
    }
}

/// Ordered child list with an id index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct Children {
    nodes: Vec<Node>,
    index: HashMap<String, Vec<usize>>,
}

impl From<Vec<Node>> for Children {
    fn from(nodes: Vec<Node>) -> Self {
        let mut children = Children::new();
        for node in nodes {
            children.push(node);
        }
        children
    }
}

impl From<Children> for Vec<Node> {
    fn from(children: Children) -> Self {
        children.nodes
    }
}

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, indexing it by id
    pub fn push(&mut self, node: Node) {
        self.index
            .entry(node.id().to_string())
            .or_default()
            .push(self.nodes.len());
        self.nodes.push(node);
    }

    /// First child with the given id
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index
            .get(id)
            .and_then(|idx| idx.first())
            .map(|&i| &self.nodes[i])
    }

    /// All children with the given id, in order
    pub fn get_all<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Node> + 'a {
        self.index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.nodes[i])
    }

    /// Number of children with the given id
    pub fn count(&self, id: &str) -> usize {
        self.index.get(id).map_or(0, Vec::len)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn last_mut(&mut self) -> Option<&mut Node> {
        self.nodes.last_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a `/`-separated id path, taking the first match at each level
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NodeNotFound`] when any step is missing.
    pub fn find_path(&self, path: &str) -> crate::Result<&Node> {
        let mut parts = path.split('/');
        let first = parts.next().unwrap_or_default();
        let mut node = self.get(first).ok_or_else(|| crate::Error::node_not_found(path))?;
        for part in parts {
            node = node
                .children()
                .and_then(|children| children.get(part))
                .ok_or_else(|| crate::Error::node_not_found(path))?;
        }
        Ok(node)
    }

    /// Total number of segments below this list
    pub fn segment_count(&self) -> usize {
        self.nodes.iter().map(Node::segment_count).sum()
    }
}

impl<'a> IntoIterator for &'a Children {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// A loop or table: a named container of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub children: Children,
}

impl Group {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Children::new(),
        }
    }
}

/// Nodes that can appear inside a transaction set body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Segment(Segment),
    Loop(Group),
    Table(Group),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Segment(s) => &s.id,
            Node::Loop(g) | Node::Table(g) => &g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Segment(s) => &s.name,
            Node::Loop(g) | Node::Table(g) => &g.name,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Node::Segment(s) => Some(s),
            Node::Loop(_) | Node::Table(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Segment(_) => None,
            Node::Loop(g) | Node::Table(g) => Some(g),
        }
    }

    pub fn children(&self) -> Option<&Children> {
        self.as_group().map(|g| &g.children)
    }

    /// Number of segments in this node, recursively
    pub fn segment_count(&self) -> usize {
        match self {
            Node::Segment(_) => 1,
            Node::Loop(g) | Node::Table(g) => g.children.segment_count(),
        }
    }

    /// First segment in document order
    pub fn first_segment(&self) -> Option<&Segment> {
        match self {
            Node::Segment(s) => Some(s),
            Node::Loop(g) | Node::Table(g) => g.children.iter().find_map(Node::first_segment),
        }
    }
}
