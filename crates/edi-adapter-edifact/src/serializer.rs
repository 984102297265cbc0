//! EDIFACT serializer
//!
//! Writes a parsed envelope back to the wire with the delimiters it was read
//! with. A UNA is written only when the source carried one.

use crate::syntax;
use crate::{Error, Result};
use edi_ir::wire::write_segment;
use edi_ir::{Children, Delimiters, Envelope, Format, Node};
use std::io::Write;

/// Serializer for EDIFACT documents
#[derive(Debug, Clone, Copy, Default)]
pub struct EdifactSerializer;

impl EdifactSerializer {
    /// Create a new EDIFACT serializer
    pub fn new() -> Self {
        Self
    }

    /// Render an envelope to bytes
    ///
    /// # Errors
    ///
    /// [`Error::Serialize`] when the envelope is not EDIFACT.
    pub fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if envelope.format != Format::Edifact {
            return Err(Error::Serialize(format!("cannot write a {} envelope as EDIFACT", envelope.format)));
        }
        let d = &envelope.delimiters;
        let mut out = Vec::new();
        if envelope.service_advice.is_some() {
            out.extend(syntax::to_una(d));
            if let Some(skip) = d.skip {
                out.push(skip);
            }
        }
        if let Some(header) = &envelope.header {
            write_segment(&mut out, header, d);
        }
        for group in &envelope.groups {
            if let Some(header) = group.header.as_ref().filter(|_| !group.implicit) {
                write_segment(&mut out, header, d);
            }
            for ts in &group.transaction_sets {
                if let Some(header) = &ts.header {
                    write_segment(&mut out, header, d);
                }
                write_children(&mut out, &ts.body, d);
                if let Some(trailer) = &ts.trailer {
                    write_segment(&mut out, trailer, d);
                }
            }
            if let Some(trailer) = group.trailer.as_ref().filter(|_| !group.implicit) {
                write_segment(&mut out, trailer, d);
            }
        }
        if let Some(trailer) = &envelope.trailer {
            write_segment(&mut out, trailer, d);
        }
        Ok(out)
    }

    /// Render an envelope into a writer
    ///
    /// # Errors
    ///
    /// See [`EdifactSerializer::serialize`]; also write failures.
    pub fn write<W: Write>(&self, envelope: &Envelope, mut writer: W) -> Result<()> {
        let bytes = self.serialize(envelope)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

fn write_children(out: &mut Vec<u8>, children: &Children, d: &Delimiters) {
    for node in children {
        match node {
            Node::Segment(segment) => write_segment(out, segment, d),
            Node::Loop(group) | Node::Table(group) => write_children(out, &group.children, d),
        }
    }
}
