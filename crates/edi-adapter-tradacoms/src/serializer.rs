//! TRADACOMS serializer

use crate::{Error, Result};
use edi_ir::wire::write_segment;
use edi_ir::{Children, Delimiters, Envelope, Format, Node};
use std::io::Write;

/// Serializer for TRADACOMS transmissions
#[derive(Debug, Clone, Copy, Default)]
pub struct TradacomsSerializer;

impl TradacomsSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Render an envelope to bytes with the delimiters it was read with
    ///
    /// # Errors
    ///
    /// [`Error::Serialize`] when the envelope is not TRADACOMS.
    pub fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        if envelope.format != Format::Tradacoms {
            return Err(Error::Serialize(format!("cannot write a {} envelope as TRADACOMS", envelope.format)));
        }
        let d = &envelope.delimiters;
        let mut out = Vec::new();
        if let Some(stx) = &envelope.header {
            write_segment(&mut out, stx, d);
        }
        for group in &envelope.groups {
            let explicit = !group.implicit;
            if let Some(bat) = group.header.as_ref().filter(|_| explicit) {
                write_segment(&mut out, bat, d);
            }
            for ts in &group.transaction_sets {
                if let Some(mhd) = &ts.header {
                    write_segment(&mut out, mhd, d);
                }
                write_children(&mut out, &ts.body, d);
                if let Some(mtr) = &ts.trailer {
                    write_segment(&mut out, mtr, d);
                }
            }
            if let Some(eob) = group.trailer.as_ref().filter(|_| explicit) {
                write_segment(&mut out, eob, d);
            }
        }
        if let Some(end) = &envelope.trailer {
            write_segment(&mut out, end, d);
        }
        Ok(out)
    }

    /// Render an envelope into a writer
    ///
    /// # Errors
    ///
    /// See [`TradacomsSerializer::serialize`]; also write failures.
    pub fn write<W: Write>(&self, envelope: &Envelope, mut writer: W) -> Result<()> {
        writer.write_all(&self.serialize(envelope)?)?;
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
