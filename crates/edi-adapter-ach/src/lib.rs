#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-adapter-ach
//!
//! NACHA ACH parser/serializer.
//!
//! An ACH file is a sequence of 94-byte records identified by their first
//! byte: `1` file header, `5` batch header, `6` entry detail, `7` addenda,
//! `8` batch control and `9` file control. The file maps to an envelope with
//! a single implicit group; every batch is a transaction set keyed by its
//! standard entry class code (PPD, CCD, CTX, ...).

pub mod layouts;
pub mod parser;
pub mod serializer;
pub mod syntax;
pub mod totals;

pub use parser::AchParser;
pub use serializer::AchSerializer;

use thiserror::Error;

/// Errors that can occur when parsing/serializing ACH
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
