#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # edi-ir
//!
//! Document tree, delimiter sets, and error records for parsed EDI interchanges.
//!
//! The tree is a small closed set of node kinds (envelope, functional group,
//! transaction set, table, loop, segment, composite and data elements) built
//! over one ordered child list with an id index. Parsers populate it; the
//! validation pass and serializers read it.

/// Envelope, functional group and transaction set containers.
pub mod document;
/// Soft error records and the severity-filtered accumulator.
pub mod errors;
/// Segment, loop, table and field nodes.
pub mod node;
/// Wire formats and per-document delimiter sets.
pub mod syntax;
/// Visitor traversal over a parsed envelope.
pub mod traversal;
/// Delimited wire rendering for serializers.
pub mod wire;
/// XML rendering.
pub mod xml;

pub use document::{Envelope, FunctionalGroup, TransactionSet};
pub use errors::{DocumentErrors, ErrorCode, ErrorLevel, ErrorRecord};
pub use node::{Children, CompositeElement, DataElement, Field, Group, Node, Segment, Value};
pub use syntax::{Delimiters, Format, NO_DELIMITER};
pub use traversal::{GroupKind, Traversal};

use thiserror::Error;

/// Errors that can occur when working with the tree
#[derive(Error, Debug)]
pub enum Error {
    #[error("Node not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("XML rendering failed: {0}")]
    Xml(String),
}

impl Error {
    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }
}

/// Crate-local result type for tree operations.
pub type Result<T> = std::result::Result<T, Error>;
