#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-adapter-tradacoms
//!
//! TRADACOMS parser/serializer and envelope handling.
//!
//! TRADACOMS uses fixed delimiters (`=` after the tag, `+`, `:`, `'` and the
//! `?` release character). An interchange is `STX ... END`; messages are
//! `MHD ... MTR` and may be batched with `BAT ... EOB`.

pub mod envelopes;
pub mod parser;
pub mod serializer;
pub mod syntax;

pub use parser::TradacomsParser;
pub use serializer::TradacomsSerializer;

use thiserror::Error;

/// Errors that can occur when parsing/serializing TRADACOMS
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
