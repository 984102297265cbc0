//! ACH serializer
//!
//! Records are rendered field by field at their layout widths, then the file
//! is padded with all-`9` filler records to a whole number of blocks and the
//! records are joined with the separator the file was read with.

use crate::layouts::{BLOCKING_FACTOR, RECORD_WIDTH, layout_for};
use crate::{Error, Result};
use edi_ir::{Children, Envelope, Format, NO_DELIMITER, Node, Segment};
use edi_parser::layout_widths;
use edi_schema::{DataType, TemplateElement};
use std::io::Write;

/// Serializer for ACH files
#[derive(Debug, Clone, Copy, Default)]
pub struct AchSerializer;

impl AchSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Render an envelope to bytes
    ///
    /// # Errors
    ///
    /// [`Error::Serialize`] when the envelope is not ACH or a value does not
    /// fit its field.
    pub fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if envelope.format != Format::Ach {
            return Err(Error::Serialize(format!("cannot write a {} envelope as ACH", envelope.format)));
        }
        let mut records = Vec::new();
        if let Some(header) = &envelope.header {
            records.push(render_record(header)?);
        }
        for batch in envelope.transaction_sets() {
            if let Some(header) = &batch.header {
                records.push(render_record(header)?);
            }
            collect(&batch.body, &mut records)?;
            if let Some(control) = &batch.trailer {
                records.push(render_record(control)?);
            }
        }
        if let Some(control) = &envelope.trailer {
            records.push(render_record(control)?);
        }
        while records.len() % BLOCKING_FACTOR != 0 {
            records.push(vec![b'9'; RECORD_WIDTH]);
        }

        let d = &envelope.delimiters;
        let mut out = Vec::with_capacity(records.len() * (RECORD_WIDTH + 2));
        for record in records {
            out.extend(record);
            if d.segment != NO_DELIMITER {
                out.push(d.segment);
                if let Some(skip) = d.skip {
                    out.push(skip);
                }
            }
        }
        Ok(out)
    }

    /// Render an envelope into a writer
    ///
    /// # Errors
    ///
    /// See [`AchSerializer::serialize`]; also write failures.
    pub fn write<W: Write>(&self, envelope: &Envelope, mut writer: W) -> Result<()> {
        writer.write_all(&self.serialize(envelope)?)?;
        Ok(())
    }
}

fn collect(children: &Children, records: &mut Vec<Vec<u8>>) -> Result<()> {
    for node in children {
        match node {
            Node::Segment(segment) => records.push(render_record(segment)?),
            Node::Loop(group) | Node::Table(group) => collect(&group.children, records)?,
        }
    }
    Ok(())
}

/// One 94-byte record
///
/// A record read without a layout keeps its whole text in field 1; every
/// layout starts with the one-byte record type instead.
fn render_record(segment: &Segment) -> Result<Vec<u8>> {
    let whole = segment.text(1).filter(|text| text.len() > 1);
    let mut record = Vec::with_capacity(RECORD_WIDTH);
    match (layout_for(&segment.id), whole) {
        (Some(layout), None) => {
            let widths = layout_widths(&layout);
            for (element, width) in layout.elements.iter().zip(widths) {
                let numeric = matches!(element, TemplateElement::Data(d) if matches!(d.data_type, DataType::Numeric(_)));
                let value = segment.text(element.position()).unwrap_or_default();
                pad(&mut record, value, width, numeric).map_err(|len| {
                    Error::Serialize(format!(
                        "record {} field {} holds {len} bytes but is {width} wide",
                        segment.id,
                        element.id()
                    ))
                })?;
            }
        }
        _ => {
            let text = whole.or_else(|| segment.text(1)).unwrap_or_default();
            pad(&mut record, text, RECORD_WIDTH, false)
                .map_err(|len| Error::Serialize(format!("record {} is {len} bytes long", segment.id)))?;
        }
    }
    Ok(record)
}

/// Numbers are zero-filled on the left, text space-filled on the right;
/// absent fields are blank.
fn pad(out: &mut Vec<u8>, value: &str, width: usize, numeric: bool) -> std::result::Result<(), usize> {
    let len = value.len();
    if len > width {
        return Err(len);
    }
    if numeric && len > 0 {
        out.resize(out.len() + width - len, b'0');
        out.extend_from_slice(value.as_bytes());
    } else {
        out.extend_from_slice(value.as_bytes());
        out.resize(out.len() + width - len, b' ');
    }
    Ok(())
}
