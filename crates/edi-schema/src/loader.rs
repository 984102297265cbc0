//! Template loader for JSON and YAML schema files

use crate::codelist::{CodeList, CodeListRegistry};
use crate::model::{
    DataType, TemplateComposite, TemplateDataElement, TemplateElement, TemplateEnvelope, TemplateLoop,
    TemplateNode, TemplateSegment, TemplateTable, TemplateTransactionSet,
};
use crate::registry::{SchemaRegistry, TransactionSetKey};
use crate::{Error, Result};
use edi_ir::Format;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SchemaFile {
    code_lists: Vec<CodeList>,
    transaction_sets: Vec<TransactionSetFile>,
    envelopes: Vec<EnvelopeFile>,
}

#[derive(Debug, Deserialize)]
struct TransactionSetFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    functional_group: Option<String>,
    #[serde(default)]
    partner: Option<PartnerFile>,
    #[serde(default)]
    body: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
struct PartnerFile {
    sender: String,
    receiver: String,
    #[serde(default)]
    test_indicator: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NodeFile {
    Segment(SegmentFile),
    Loop(LoopFile),
    Table(TableFile),
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    xml_tag: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default = "default_max_use")]
    max_use: usize,
    #[serde(default)]
    elements: Vec<ElementFile>,
}

#[derive(Debug, Deserialize)]
struct LoopFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default = "default_max_use")]
    max_use: usize,
    children: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    children: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
struct ElementFile {
    position: usize,
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    xml_tag: Option<String>,
    #[serde(rename = "type", default)]
    data_type: Option<String>,
    #[serde(default)]
    min_length: usize,
    #[serde(default = "default_max_length")]
    max_length: usize,
    #[serde(default)]
    required: bool,
    /// Inline codes
    #[serde(default)]
    codes: Vec<String>,
    /// Reference to a named list in `code_lists`
    #[serde(default)]
    code_list: Option<String>,
    /// Present for composites
    #[serde(default)]
    components: Vec<ElementFile>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeFile {
    format: Format,
    #[serde(default)]
    service_advice: Option<SegmentFile>,
    header: SegmentFile,
    trailer: SegmentFile,
    #[serde(default)]
    group_header: Option<SegmentFile>,
    #[serde(default)]
    group_trailer: Option<SegmentFile>,
    #[serde(default)]
    set_header: Option<SegmentFile>,
    #[serde(default)]
    set_trailer: Option<SegmentFile>,
}

fn default_max_use() -> usize {
    1
}

fn default_max_length() -> usize {
    35
}

/// Templates read from one schema document
#[derive(Debug, Default)]
pub struct LoadedSchema {
    pub transaction_sets: Vec<(TransactionSetKey, TemplateTransactionSet)>,
    pub envelopes: Vec<TemplateEnvelope>,
}

impl LoadedSchema {
    /// Move every template into `registry`
    pub fn register(self, registry: &SchemaRegistry) {
        for (key, template) in self.transaction_sets {
            registry.register_for(key, template);
        }
        for envelope in self.envelopes {
            registry.register_envelope(envelope);
        }
    }
}

/// Builds templates from schema documents
#[derive(Debug, Default)]
pub struct SchemaLoader {
    code_lists: CodeListRegistry,
}

impl SchemaLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from code lists shared across several schema files
    #[must_use]
    pub fn with_code_lists(code_lists: CodeListRegistry) -> Self {
        Self { code_lists }
    }

    /// Load a schema file, choosing YAML for `.yaml`/`.yml` and JSON otherwise
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or
    /// [`Error::InvalidFormat`] if it does not describe valid templates.
    pub fn load_from_file(&mut self, path: &Path) -> Result<LoadedSchema> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] on malformed JSON or templates.
    pub fn load_from_json(&mut self, json: &str) -> Result<LoadedSchema> {
        let file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;
        self.convert(file)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] on malformed YAML or templates.
    pub fn load_from_yaml(&mut self, yaml: &str) -> Result<LoadedSchema> {
        let file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;
        self.convert(file)
    }

    fn convert(&mut self, file: SchemaFile) -> Result<LoadedSchema> {
        for list in file.code_lists {
            debug!("Registering code list {} ({} codes)", list.name, list.len());
            self.code_lists.register(list);
        }

        let mut loaded = LoadedSchema::default();
        for ts in file.transaction_sets {
            let mut key = TransactionSetKey::new(ts.id.clone());
            key.version.clone_from(&ts.version);
            if let Some(p) = ts.partner {
                key = key.with_parties(p.sender, p.receiver);
                if let Some(t) = p.test_indicator {
                    key = key.with_test_indicator(t);
                }
            }
            let mut template = TemplateTransactionSet::new(ts.id.clone(), ts.name.unwrap_or_else(|| ts.id.clone()));
            template.version = ts.version;
            template.functional_group = ts.functional_group;
            for node in ts.body {
                template.tables.push(self.node(node)?);
            }
            debug!("Loaded transaction set template {}", key);
            loaded.transaction_sets.push((key, template));
        }
        for env in file.envelopes {
            loaded.envelopes.push(TemplateEnvelope {
                format: env.format,
                service_advice: env.service_advice.map(|s| self.segment(s)).transpose()?,
                header: self.segment(env.header)?,
                trailer: self.segment(env.trailer)?,
                group_header: env.group_header.map(|s| self.segment(s)).transpose()?,
                group_trailer: env.group_trailer.map(|s| self.segment(s)).transpose()?,
                set_header: env.set_header.map(|s| self.segment(s)).transpose()?,
                set_trailer: env.set_trailer.map(|s| self.segment(s)).transpose()?,
            });
        }
        Ok(loaded)
    }

    fn node(&self, node: NodeFile) -> Result<TemplateNode> {
        match node {
            NodeFile::Segment(s) => Ok(TemplateNode::Segment(self.segment(s)?)),
            NodeFile::Loop(l) => {
                let name = l.name.unwrap_or_else(|| l.id.clone());
                let mut children = l.children.into_iter().map(|c| self.node(c));
                let lead = match children.next().transpose()? {
                    Some(TemplateNode::Segment(s)) => s,
                    _ => {
                        return Err(Error::InvalidFormat(format!(
                            "loop {} must start with a segment",
                            l.id
                        )));
                    }
                };
                let mut lp = TemplateLoop::new(l.id, name, lead).max_use(l.max_use);
                lp.required = l.required;
                for child in children {
                    lp.children.push(child?);
                }
                Ok(TemplateNode::Loop(lp))
            }
            NodeFile::Table(t) => {
                let mut table = TemplateTable::new(t.id.clone(), t.name.unwrap_or(t.id));
                for child in t.children {
                    table.children.push(self.node(child)?);
                }
                Ok(TemplateNode::Table(table))
            }
        }
    }

    fn segment(&self, file: SegmentFile) -> Result<TemplateSegment> {
        let name = file.name.unwrap_or_else(|| file.id.clone());
        let mut segment = TemplateSegment::new(file.id, name).max_use(file.max_use);
        segment.required = file.required;
        if let Some(tag) = file.xml_tag {
            segment.xml_tag = tag;
        }
        for element in file.elements {
            segment.elements.insert(self.element(element)?);
        }
        Ok(segment)
    }

    fn element(&self, file: ElementFile) -> Result<TemplateElement> {
        let name = file.name.unwrap_or_else(|| file.id.clone());
        if !file.components.is_empty() {
            let mut composite = TemplateComposite::new(file.id, name, file.position);
            composite.required = file.required;
            if let Some(tag) = file.xml_tag {
                composite.xml_tag = tag;
            }
            for component in file.components {
                composite.elements.insert(self.element(component)?);
            }
            return Ok(TemplateElement::Composite(composite));
        }

        let data_type = match file.data_type.as_deref() {
            None => DataType::Alphanumeric,
            Some(code) => DataType::parse(code).ok_or_else(|| {
                Error::InvalidFormat(format!("element {}: unknown data type '{code}'", file.id))
            })?,
        };
        let mut element = TemplateDataElement::new(
            file.id.clone(),
            name,
            file.position,
            data_type,
            file.min_length,
            file.max_length,
        );
        element.required = file.required;
        if let Some(tag) = file.xml_tag {
            element.xml_tag = tag;
        }
        if let Some(list_name) = file.code_list {
            let list = self.code_lists.get(&list_name).ok_or_else(|| {
                Error::InvalidFormat(format!("element {}: unknown code list '{list_name}'", file.id))
            })?;
            element.codes = Some(list);
        } else if !file.codes.is_empty() {
            element.codes = Some(std::sync::Arc::new(CodeList::with_codes(file.id, file.codes)));
        }
        Ok(TemplateElement::Data(element))
    }
}
