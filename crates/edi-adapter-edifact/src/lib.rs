#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-adapter-edifact
//!
//! EDIFACT/EANCOM parser/serializer and envelope handling.
//!
//! The parser sniffs the delimiters from UNA (or falls back to the level A
//! defaults), walks the interchange, group and message envelopes, and hands
//! each message body to the template-driven body parser of `edi-parser`.

pub mod envelopes;
pub mod parser;
pub mod serializer;
pub mod syntax;

pub use parser::EdifactParser;
pub use serializer::EdifactSerializer;

use thiserror::Error;

/// Errors that can occur when parsing/serializing EDIFACT
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] edi_parser::Error),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Soft errors gathered before a parse was abandoned
    pub fn errors(&self) -> Option<&edi_ir::DocumentErrors> {
        match self {
            Self::Parse(e) => e.errors(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
