//! Interchange-level containers: envelope, functional group, transaction set
#![allow(clippy::must_use_candidate)] // Builder/constructor API intentionally omits pervasive #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builder methods return Self for ergonomics.

use crate::node::{Children, Segment};
use crate::syntax::{Delimiters, Format};
use serde::{Deserialize, Serialize};

/// One business document (message) inside a functional group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSet {
    /// Message type (e.g. `ORDERS`, `ORDHDR`, ACH SEC code)
    pub id: String,

    /// Template name
    pub name: String,

    /// Version/release the template was resolved for
    pub version: Option<String>,

    /// Message reference / control number
    pub control_number: Option<String>,

    /// Interchange sender
    pub sender: Option<String>,

    /// Interchange receiver
    pub receiver: Option<String>,

    /// Test/production indicator
    pub test_indicator: Option<String>,

    /// Header segment (UNH, MHD, ACH batch header)
    pub header: Option<Segment>,

    /// Trailer segment (UNT, MTR, ACH batch control)
    pub trailer: Option<Segment>,

    /// Tables of the message body
    pub body: Children,
}

impl TransactionSet {
    /// Create an empty transaction set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
            control_number: None,
            sender: None,
            receiver: None,
            test_indicator: None,
            header: None,
            trailer: None,
            body: Children::new(),
        }
    }

    /// Segment count including header and trailer
    pub fn segment_count(&self) -> usize {
        usize::from(self.header.is_some())
            + self.body.segment_count()
            + usize::from(self.trailer.is_some())
    }
}

/// A batch of transaction sets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionalGroup {
    /// Group header (UNG, BAT, ACH batch header)
    pub header: Option<Segment>,

    /// Group trailer (UNE, EOB, ACH batch control)
    pub trailer: Option<Segment>,

    /// True when the group markers were elided in the source
    pub implicit: bool,

    pub transaction_sets: Vec<TransactionSet>,
}

impl FunctionalGroup {
    /// Group introduced by an explicit header segment
    pub fn explicit(header: Segment) -> Self {
        Self {
            header: Some(header),
            ..Self::default()
        }
    }

    /// Synthesized group for documents without group markers
    pub fn implicit() -> Self {
        Self {
            implicit: true,
            ..Self::default()
        }
    }
}

/// Outermost interchange envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub format: Format,

    /// Delimiters the document was read with; reused on serialization
    pub delimiters: Delimiters,

    /// Service string advice (EDIFACT UNA)
    pub service_advice: Option<Segment>,

    /// Interchange header (UNB, STX, ACH file header)
    pub header: Option<Segment>,

    /// Interchange trailer (UNZ, END, ACH file control)
    pub trailer: Option<Segment>,

    pub groups: Vec<FunctionalGroup>,
}

impl Envelope {
    /// Create an empty envelope
    pub fn new(format: Format, delimiters: Delimiters) -> Self {
        Self {
            format,
            delimiters,
            service_advice: None,
            header: None,
            trailer: None,
            groups: Vec::new(),
        }
    }

    /// All transaction sets across groups, in document order
    pub fn transaction_sets(&self) -> impl Iterator<Item = &TransactionSet> {
        self.groups.iter().flat_map(|g| g.transaction_sets.iter())
    }

    /// Number of transaction sets across groups
    pub fn transaction_set_count(&self) -> usize {
        self.groups.iter().map(|g| g.transaction_sets.len()).sum()
    }
}
