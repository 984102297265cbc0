#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

//! # edi-schema
//!
//! Read-only templates describing the segments, loops and elements a message
//! is expected to contain, plus the lookup that resolves them at parse time.
//!
//! Resolution walks from the most specific key to the least:
//! message id + version + trading partners + test flag, then id + version,
//! then the bare message id.

pub mod codelist;
pub mod loader;
pub mod model;
pub mod registry;
pub mod validator;

pub use codelist::{CodeList, CodeListRegistry};
pub use loader::{LoadedSchema, SchemaLoader};
pub use model::{
    DataType, ElementContainer, TemplateComposite, TemplateDataElement, TemplateElement, TemplateEnvelope,
    TemplateLoop, TemplateNode, TemplateSegment, TemplateTable, TemplateTransactionSet,
};
pub use registry::{SchemaLookup, SchemaRegistry, TransactionSetKey};
pub use validator::{FnValidator, Validator};

use thiserror::Error;

/// Errors that can occur when working with schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
