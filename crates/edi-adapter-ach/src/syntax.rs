//! ACH file detection and record separator sniffing

use crate::layouts::RECORD_WIDTH;
use edi_ir::{Delimiters, NO_DELIMITER};
use edi_parser::{CharStream, Result};
use std::io::Read;

/// Byte range of the record size ("094") in the file header
const RECORD_SIZE_RANGE: std::ops::Range<usize> = 34..37;

/// True when `prefix` starts with an ACH file header record
pub fn is_ach(prefix: &[u8]) -> bool {
    prefix.first() == Some(&b'1') && prefix.get(RECORD_SIZE_RANGE) == Some(&b"094"[..])
}

/// Work out how records are separated from the bytes after the first one
///
/// LF, CR LF and contiguous records are recognized; the result is kept on
/// the envelope so a file is written back the way it was read. Nothing is
/// consumed.
///
/// # Errors
///
/// Read failures from the underlying stream.
pub fn sniff<R: Read>(stream: &mut CharStream<R>) -> Result<Delimiters> {
    let head = stream.peek(RECORD_WIDTH + 2)?;
    let ach = Delimiters::ach();
    Ok(match (head.get(RECORD_WIDTH), head.get(RECORD_WIDTH + 1)) {
        (Some(b'\r'), Some(b'\n')) => Delimiters {
            segment: b'\r',
            skip: Some(b'\n'),
            ..ach
        },
        (Some(b'\n' | b'\r'), _) => Delimiters {
            segment: head[RECORD_WIDTH],
            ..ach
        },
        _ => Delimiters {
            segment: NO_DELIMITER,
            ..ach
        },
    })
}
