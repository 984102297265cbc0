//! Template model: the read-only description of expected segments and elements
//!
//! Templates are built once (by hand or through [`crate::SchemaLoader`]) and
//! shared behind `Arc` by every document parsed against them.

use crate::codelist::CodeList;
use crate::validator::Validator;
use edi_ir::Format;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Data type of a simple data element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    /// Free text
    #[default]
    Alphanumeric,
    /// Coded value, checked against a code list
    Identifier,
    /// Integer with an implied decimal scale
    Numeric(u8),
    /// Explicit decimal
    Decimal,
    Date,
    Time,
    Binary,
}

impl DataType {
    /// Parse a schema type code such as `AN`, `ID`, `N2`, `R`, `DT`, `TM` or `B`
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_uppercase();
        match code.as_str() {
            "AN" | "A" => Some(Self::Alphanumeric),
            "ID" => Some(Self::Identifier),
            "N" => Some(Self::Numeric(0)),
            "R" => Some(Self::Decimal),
            "DT" => Some(Self::Date),
            "TM" => Some(Self::Time),
            "B" => Some(Self::Binary),
            other => other
                .strip_prefix('N')
                .and_then(|scale| scale.parse::<u8>().ok())
                .map(Self::Numeric),
        }
    }

    #[must_use]
    pub fn code(self) -> String {
        match self {
            Self::Alphanumeric => "AN".to_string(),
            Self::Identifier => "ID".to_string(),
            Self::Numeric(scale) => format!("N{scale}"),
            Self::Decimal => "R".to_string(),
            Self::Date => "DT".to_string(),
            Self::Time => "TM".to_string(),
            Self::Binary => "B".to_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Template for a simple data element
#[derive(Debug, Clone)]
pub struct TemplateDataElement {
    pub id: String,
    pub name: String,
    pub xml_tag: String,
    /// 1-based position inside the owning segment or composite
    pub position: usize,
    pub data_type: DataType,
    pub min_length: usize,
    pub max_length: usize,
    pub required: bool,
    pub codes: Option<Arc<CodeList>>,
}

impl TemplateDataElement {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        position: usize,
        data_type: DataType,
        min_length: usize,
        max_length: usize,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            xml_tag: name.clone(),
            name,
            position,
            data_type,
            min_length,
            max_length,
            required: false,
            codes: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_codes(mut self, codes: Arc<CodeList>) -> Self {
        self.codes = Some(codes);
        self
    }

    #[must_use]
    pub fn with_xml_tag(mut self, tag: impl Into<String>) -> Self {
        self.xml_tag = tag.into();
        self
    }

    /// An ID-typed element that carries a code list
    #[must_use]
    pub fn is_coded(&self) -> bool {
        self.data_type == DataType::Identifier && self.codes.is_some()
    }
}

/// Template for a composite data element
#[derive(Debug, Clone)]
pub struct TemplateComposite {
    pub id: String,
    pub name: String,
    pub xml_tag: String,
    pub position: usize,
    pub required: bool,
    pub elements: ElementContainer,
}

impl TemplateComposite {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: usize) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            xml_tag: name.clone(),
            name,
            position,
            required: false,
            elements: ElementContainer::new(),
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with(mut self, element: TemplateDataElement) -> Self {
        self.elements.insert(TemplateElement::Data(element));
        self
    }
}

/// A data element or nested composite inside an [`ElementContainer`]
#[derive(Debug, Clone)]
pub enum TemplateElement {
    Data(TemplateDataElement),
    Composite(TemplateComposite),
}

impl TemplateElement {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Data(d) => d.position,
            Self::Composite(c) => c.position,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Data(d) => &d.id,
            Self::Composite(c) => &c.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Data(d) => &d.name,
            Self::Composite(c) => &c.name,
        }
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            Self::Data(d) => d.required,
            Self::Composite(c) => c.required,
        }
    }
}

/// Position-ordered map of element templates
#[derive(Debug, Clone, Default)]
pub struct ElementContainer {
    elements: BTreeMap<usize, TemplateElement>,
}

impl ElementContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element at its own position, replacing any previous one
    pub fn insert(&mut self, element: TemplateElement) {
        self.elements.insert(element.position(), element);
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TemplateElement> {
        self.elements.get(&position)
    }

    /// Elements in ascending position order
    pub fn iter(&self) -> impl Iterator<Item = &TemplateElement> {
        self.elements.values()
    }

    #[must_use]
    pub fn max_position(&self) -> usize {
        self.elements.keys().next_back().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Template for a segment
#[derive(Debug, Clone)]
pub struct TemplateSegment {
    pub id: String,
    pub name: String,
    pub xml_tag: String,
    pub required: bool,
    pub max_use: usize,
    pub elements: ElementContainer,
    pub validator: Option<Arc<dyn Validator>>,
}

impl TemplateSegment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            xml_tag: name.clone(),
            name,
            required: false,
            max_use: 1,
            elements: ElementContainer::new(),
            validator: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn max_use(mut self, max_use: usize) -> Self {
        self.max_use = max_use;
        self
    }

    #[must_use]
    pub fn with_element(mut self, element: TemplateDataElement) -> Self {
        self.elements.insert(TemplateElement::Data(element));
        self
    }

    #[must_use]
    pub fn with_composite(mut self, composite: TemplateComposite) -> Self {
        self.elements.insert(TemplateElement::Composite(composite));
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// Template for a repeating loop; the first child is the lead segment
#[derive(Debug, Clone)]
pub struct TemplateLoop {
    pub id: String,
    pub name: String,
    pub required: bool,
    pub max_use: usize,
    pub children: Vec<TemplateNode>,
    pub validator: Option<Arc<dyn Validator>>,
}

impl TemplateLoop {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lead: TemplateSegment) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            required: false,
            max_use: 1,
            children: vec![TemplateNode::Segment(lead)],
            validator: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn max_use(mut self, max_use: usize) -> Self {
        self.max_use = max_use;
        self
    }

    #[must_use]
    pub fn with(mut self, child: impl Into<TemplateNode>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn lead(&self) -> Option<&TemplateSegment> {
        match self.children.first() {
            Some(TemplateNode::Segment(s)) => Some(s),
            _ => None,
        }
    }
}

/// Template for a table: an unbounded section of a transaction set body
#[derive(Debug, Clone)]
pub struct TemplateTable {
    pub id: String,
    pub name: String,
    pub children: Vec<TemplateNode>,
}

impl TemplateTable {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, child: impl Into<TemplateNode>) -> Self {
        self.children.push(child.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum TemplateNode {
    Segment(TemplateSegment),
    Loop(TemplateLoop),
    Table(TemplateTable),
}

impl From<TemplateSegment> for TemplateNode {
    fn from(value: TemplateSegment) -> Self {
        Self::Segment(value)
    }
}

impl From<TemplateLoop> for TemplateNode {
    fn from(value: TemplateLoop) -> Self {
        Self::Loop(value)
    }
}

impl From<TemplateTable> for TemplateNode {
    fn from(value: TemplateTable) -> Self {
        Self::Table(value)
    }
}

impl TemplateNode {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Segment(s) => &s.id,
            Self::Loop(l) => &l.id,
            Self::Table(t) => &t.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Segment(s) => &s.name,
            Self::Loop(l) => &l.name,
            Self::Table(t) => &t.name,
        }
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        match self {
            Self::Segment(s) => s.required,
            Self::Loop(l) => l.required,
            Self::Table(t) => t.children.iter().any(TemplateNode::is_required),
        }
    }

    /// Maximum occurrences; tables occur once
    #[must_use]
    pub fn max_use(&self) -> usize {
        match self {
            Self::Segment(s) => s.max_use,
            Self::Loop(l) => l.max_use,
            Self::Table(_) => 1,
        }
    }

    /// Segment template that opens this node, if it has one
    #[must_use]
    pub fn lead_segment(&self) -> Option<&TemplateSegment> {
        match self {
            Self::Segment(s) => Some(s),
            Self::Loop(l) => l.lead(),
            Self::Table(_) => None,
        }
    }

    /// Whether a segment with this id can start (or continue into) the node
    #[must_use]
    pub fn accepts(&self, segment_id: &str) -> bool {
        match self {
            Self::Table(t) => t.children.iter().any(|c| c.accepts(segment_id)),
            _ => self.lead_segment().is_some_and(|s| s.id == segment_id),
        }
    }

    #[must_use]
    pub fn validator(&self) -> Option<&Arc<dyn Validator>> {
        match self {
            Self::Segment(s) => s.validator.as_ref(),
            Self::Loop(l) => l.validator.as_ref(),
            Self::Table(_) => None,
        }
    }
}

/// Template for one message type
#[derive(Debug, Clone)]
pub struct TemplateTransactionSet {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub functional_group: Option<String>,
    /// Top-level body nodes, normally tables
    pub tables: Vec<TemplateNode>,
}

impl TemplateTransactionSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
            functional_group: None,
            tables: Vec::new(),
        }
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn functional_group(mut self, group: impl Into<String>) -> Self {
        self.functional_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with(mut self, node: impl Into<TemplateNode>) -> Self {
        self.tables.push(node.into());
        self
    }
}

/// Templates for the control segments wrapping transaction sets
#[derive(Debug, Clone)]
pub struct TemplateEnvelope {
    pub format: Format,
    pub service_advice: Option<TemplateSegment>,
    pub header: TemplateSegment,
    pub trailer: TemplateSegment,
    pub group_header: Option<TemplateSegment>,
    pub group_trailer: Option<TemplateSegment>,
    pub set_header: Option<TemplateSegment>,
    pub set_trailer: Option<TemplateSegment>,
}

impl TemplateEnvelope {
    /// Find the control segment template with the given id
    #[must_use]
    pub fn control_segment(&self, id: &str) -> Option<&TemplateSegment> {
        [
            self.service_advice.as_ref(),
            Some(&self.header),
            Some(&self.trailer),
            self.group_header.as_ref(),
            self.group_trailer.as_ref(),
            self.set_header.as_ref(),
            self.set_trailer.as_ref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| s.id == id)
    }
}
