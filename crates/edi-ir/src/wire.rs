//! Rendering segments back to delimited wire text
#![allow(clippy::must_use_candidate)]

use crate::node::{Field, Segment, Value};
use crate::syntax::Delimiters;

/// Append `segment` to `out` with its terminator
///
/// Positions missing between populated fields are written empty; nothing is
/// written after the last populated field or component. Text is escaped,
/// binary payloads are copied as they are.
pub fn write_segment(out: &mut Vec<u8>, segment: &Segment, delimiters: &Delimiters) {
    out.extend_from_slice(segment.id.as_bytes());
    let mut written = 0;
    for (&position, field) in &segment.fields {
        while written < position {
            written += 1;
            let separator = match delimiters.tag {
                Some(tag) if written == 1 => tag,
                _ => delimiters.field,
            };
            out.push(separator);
        }
        match field {
            Field::Data(d) => write_value(out, &d.value, delimiters),
            Field::Composite(c) => {
                let mut component = 1;
                for (&k, element) in &c.components {
                    while component < k {
                        out.push(delimiters.component);
                        component += 1;
                    }
                    write_value(out, &element.value, delimiters);
                }
            }
        }
    }
    if written == 0 {
        if let Some(tag) = delimiters.tag {
            out.push(tag);
        }
    }
    out.push(delimiters.segment);
    if let Some(skip) = delimiters.skip {
        out.push(skip);
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value, delimiters: &Delimiters) {
    match value {
        Value::String(s) => out.extend_from_slice(delimiters.escape_value(s).as_bytes()),
        Value::Binary(bytes) => out.extend_from_slice(bytes),
        Value::Null => {}
    }
}

/// Wire text of a single segment
pub fn segment_bytes(segment: &Segment, delimiters: &Delimiters) -> Vec<u8> {
    let mut out = Vec::new();
    write_segment(&mut out, segment, delimiters);
    out
}
