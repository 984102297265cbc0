//! Soft error records and the append-only accumulator
//!
//! Parsing and validation never stop on these: they are collected with their
//! position, segment id and byte offset and inspected by the caller afterwards.
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Severity of a recorded error, ordered from lax to strict
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    /// Situational rule not met
    #[default]
    Situation,
    /// A requirement of the template not met
    Requirement,
    /// Structural integrity of the interchange broken
    Integrity,
    /// Unrecoverable for the affected transaction set
    Fatal,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorLevel::Situation => "situation",
            ErrorLevel::Requirement => "requirement",
            ErrorLevel::Integrity => "integrity",
            ErrorLevel::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Error codes for soft errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    UnrecognizedSegment,
    UnexpectedSegment,
    MandatorySegmentMissing,
    LoopOverMax,
    SegmentOverMaxUse,
    ZeroLengthSegment,
    TooManyDataElements,
    MandatoryElementMissing,
    ElementTooShort,
    ElementTooLong,
    InvalidCharacter,
    InvalidCodeValue,
    InvalidDate,
    InvalidTime,
    UnknownTransactionSet,
    ControlCountMismatch,
    ControlReferenceMismatch,
    MissingTrailer,
    ValidatorRejected,
}

impl ErrorCode {
    /// Stable numeric code
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UnrecognizedSegment => "1",
            ErrorCode::UnexpectedSegment => "2",
            ErrorCode::MandatorySegmentMissing => "3",
            ErrorCode::LoopOverMax => "4",
            ErrorCode::SegmentOverMaxUse => "5",
            ErrorCode::ZeroLengthSegment => "6",
            ErrorCode::TooManyDataElements => "7",
            ErrorCode::MandatoryElementMissing => "11",
            ErrorCode::ElementTooShort => "14",
            ErrorCode::ElementTooLong => "15",
            ErrorCode::InvalidCharacter => "16",
            ErrorCode::InvalidCodeValue => "17",
            ErrorCode::InvalidDate => "18",
            ErrorCode::InvalidTime => "19",
            ErrorCode::UnknownTransactionSet => "21",
            ErrorCode::ControlCountMismatch => "22",
            ErrorCode::ControlReferenceMismatch => "23",
            ErrorCode::MissingTrailer => "24",
            ErrorCode::ValidatorRejected => "30",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded error; never mutated once accumulated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 1-based segment position (0 when not tied to a segment)
    pub position: usize,
    /// Id of the segment being processed
    pub segment_id: String,
    /// Human readable description
    pub description: String,
    /// Path of the owning container
    pub container: String,
    pub code: ErrorCode,
    /// The value or id that caused the error
    pub offending: Option<String>,
    pub level: ErrorLevel,
    /// Approximate byte offset in the source
    pub byte_offset: usize,
}

impl ErrorRecord {
    /// Start a record; location fields default to zero/empty
    pub fn new(code: ErrorCode, level: ErrorLevel, description: impl Into<String>) -> Self {
        Self {
            position: 0,
            segment_id: String::new(),
            description: description.into(),
            container: String::new(),
            code,
            offending: None,
            level,
            byte_offset: 0,
        }
    }

    /// Segment location of the error
    pub fn at(mut self, position: usize, segment_id: impl Into<String>, byte_offset: usize) -> Self {
        self.position = position;
        self.segment_id = segment_id.into();
        self.byte_offset = byte_offset;
        self
    }

    /// Owning container path
    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Offending value
    pub fn with_offending(mut self, offending: impl Into<String>) -> Self {
        self.offending = Some(offending.into());
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] segment {} '{}' at byte {}: {}",
            self.level, self.code, self.position, self.segment_id, self.byte_offset, self.description
        )?;
        if let Some(offending) = &self.offending {
            write!(f, " (value '{offending}')")?;
        }
        Ok(())
    }
}

/// Append-only error accumulator with insertion-time severity filtering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentErrors {
    min_level: ErrorLevel,
    records: Vec<ErrorRecord>,
}

impl DocumentErrors {
    /// Create an accumulator that keeps records at or above `min_level`
    pub fn new(min_level: ErrorLevel) -> Self {
        Self {
            min_level,
            records: Vec::new(),
        }
    }

    pub fn min_level(&self) -> ErrorLevel {
        self.min_level
    }

    /// Append a record; returns false when it was dropped by the level filter
    pub fn add(&mut self, record: ErrorRecord) -> bool {
        if record.level < self.min_level {
            debug!(code = %record.code, level = %record.level, "dropped below minimum level");
            return false;
        }
        if record.level >= ErrorLevel::Integrity {
            warn!("{}", record);
        } else {
            debug!("{}", record);
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records carrying `code`
    pub fn with_code(&self, code: ErrorCode) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.code == code)
    }

    /// Number of records at or above `level`
    pub fn count_at_least(&self, level: ErrorLevel) -> usize {
        self.records.iter().filter(|r| r.level >= level).count()
    }
}

impl<'a> IntoIterator for &'a DocumentErrors {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for DocumentErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.records.len())?;
        for record in &self.records {
            write!(f, "\n  {record}")?;
        }
        Ok(())
    }
}
