#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-parser
//!
//! The format-independent parsing core shared by the EDIFACT, TRADACOMS and
//! ACH adapters.
//!
//! * [`tokenizer`]: a byte stream with pushback, the segment reader, the
//!   data/sub-field and binary tokenizers, and the [`Tokenizer`] facade that
//!   tracks segment positions and byte offsets and owns the error accumulator.
//! * [`matcher`]: content-based disambiguation between templates that start
//!   with the same segment id.
//! * [`engine`]: the resumable, template-driven transaction-set body parser.
//! * [`handler`]: the notification interface parsers report structure through.
//!
//! Parsing is synchronous and single-threaded; a tokenizer owns its input.

pub mod config;
pub mod document;
pub mod engine;
pub mod handler;
pub mod matcher;
pub mod tokenizer;

pub use config::ParserConfig;
pub use document::{finish_document, missing_trailer, resolve_transaction_set, verify_count, verify_reference};
pub use engine::{BodyParser, Outcome, build_segment, element_widths, layout_widths, parse_untemplated};
pub use handler::{DocumentHandler, Flow, NullHandler, ParseStatus, ParsedDocument};
pub use matcher::{Verdict, can_prevalidate, is_this_you, why_not_you};
pub use tokenizer::{
    BinaryTokenizer, CharStream, DataTokenizer, FixedTokenizer, RawSegment, StreamTokenizer, Tokenizer, Tokens,
};

use edi_ir::DocumentErrors;
use thiserror::Error;

/// Conditions that stop a parse
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Expected {expected} but found '{found}' at byte {offset}")]
    MissingSegment {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("Binary segment {segment}: {message}")]
    BinaryLength { segment: String, message: String },

    #[error("No transaction set definition for {key}")]
    UnknownTransactionSet { key: String, errors: DocumentErrors },

    #[error("Parse rejected with {count} accumulated errors", count = .errors.len())]
    Rejected { errors: DocumentErrors },

    #[error("Schema error: {0}")]
    Schema(#[from] edi_schema::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn binary_length(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BinaryLength {
            segment: segment.into(),
            message: message.into(),
        }
    }

    pub fn missing_segment(expected: impl Into<String>, found: impl Into<String>, offset: usize) -> Self {
        Self::MissingSegment {
            expected: expected.into(),
            found: found.into(),
            offset,
        }
    }

    /// Soft errors gathered before the failure, when the variant carries them
    pub fn errors(&self) -> Option<&DocumentErrors> {
        match self {
            Self::UnknownTransactionSet { errors, .. } | Self::Rejected { errors } => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
