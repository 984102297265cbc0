//! EDIFACT syntax definitions and delimiter handling
//!
//! This module handles the service string advice (UNA) and the level A
//! defaults used when a document does not carry one.

use edi_ir::Delimiters;
use edi_parser::{CharStream, Result};
use std::io::Read;

/// Length of `UNA` plus its six service characters
pub const UNA_LENGTH: usize = 9;

/// What the sniffer learned from the start of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvice {
    pub delimiters: Delimiters,
    /// Tokens of the consumed UNA segment, to be replayed to the parser
    pub una: Option<Vec<String>>,
}

/// Parse separators from a UNA segment
///
/// ```text
/// UNA:+.? '
/// 012345678
/// ```
///
/// Position 6 is the release character and position 7 the repetition
/// separator; a space in either means the function is not used.
pub fn from_una(una: &[u8]) -> Option<Delimiters> {
    if una.len() < UNA_LENGTH || &una[0..3] != b"UNA" {
        return None;
    }
    let optional = |b: u8| (b != b' ').then_some(b);
    Some(Delimiters {
        component: una[3],
        field: una[4],
        decimal: una[5],
        escape: optional(una[6]),
        repetition: optional(una[7]),
        segment: una[8],
        ..Delimiters::edifact()
    })
}

/// The nine bytes of a UNA segment advertising `delimiters`
pub fn to_una(delimiters: &Delimiters) -> Vec<u8> {
    vec![
        b'U',
        b'N',
        b'A',
        delimiters.component,
        delimiters.field,
        delimiters.decimal,
        delimiters.escape.unwrap_or(b' '),
        delimiters.repetition.unwrap_or(b' '),
        delimiters.segment,
    ]
}

/// Read the delimiters for an interchange from its first bytes
///
/// When the input starts with UNA its nine bytes are consumed and returned
/// as replay tokens; a CR or LF right after it becomes the skip character.
/// Otherwise everything peeked is left in the stream and the defaults apply.
///
/// # Errors
///
/// Read failures from the underlying stream.
pub fn sniff<R: Read>(stream: &mut CharStream<R>) -> Result<ServiceAdvice> {
    let head = stream.peek(UNA_LENGTH + 1)?;
    let Some(mut delimiters) = from_una(&head) else {
        return Ok(ServiceAdvice {
            delimiters: Delimiters::edifact(),
            una: None,
        });
    };
    if let Some(&next) = head.get(UNA_LENGTH) {
        if next == b'\r' || next == b'\n' {
            delimiters.skip = Some(next);
        }
    }
    for _ in 0..UNA_LENGTH {
        stream.next_byte()?;
    }
    let mut una = vec!["UNA".to_string()];
    una.extend(head[3..UNA_LENGTH].iter().map(|&b| char::from(b).to_string()));
    Ok(ServiceAdvice {
        delimiters,
        una: Some(una),
    })
}

/// True when `prefix` looks like the start of an EDIFACT interchange
pub fn is_edifact(prefix: &[u8]) -> bool {
    let trimmed = prefix.trim_ascii_start();
    trimmed.starts_with(b"UNA") || trimmed.starts_with(b"UNB")
}
