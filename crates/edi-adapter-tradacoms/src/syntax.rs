//! TRADACOMS delimiters
//!
//! The format has no service string advice: the sniffer only confirms the
//! interchange header and leaves every byte in the stream.

use edi_ir::Delimiters;
use edi_parser::{CharStream, Result};
use std::io::Read;

/// Bytes inspected when sniffing
pub const SNIFF_LENGTH: usize = 10;

/// Delimiters for a TRADACOMS stream; nothing is consumed
///
/// A line break after the first segment terminator becomes the skip
/// character so serialization keeps the same layout.
///
/// # Errors
///
/// Read failures from the underlying stream.
pub fn sniff<R: Read>(stream: &mut CharStream<R>) -> Result<Delimiters> {
    let head = stream.peek(SNIFF_LENGTH)?;
    let mut delimiters = Delimiters::tradacoms();
    if !is_tradacoms(&head) {
        return Ok(delimiters);
    }
    // the first segment is short; look a little further for its terminator
    let ahead = stream.peek(512)?;
    if let Some(end) = ahead.iter().position(|&b| b == delimiters.segment) {
        if let Some(&next) = ahead.get(end + 1) {
            if next == b'\r' || next == b'\n' {
                delimiters.skip = Some(next);
            }
        }
    }
    Ok(delimiters)
}

/// True when `prefix` starts with a TRADACOMS interchange header
pub fn is_tradacoms(prefix: &[u8]) -> bool {
    prefix.trim_ascii_start().starts_with(b"STX=")
}
