#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

//! # edi-validation
//!
//! Post-parse validation of a finished tree against its templates.
//!
//! The pass checks segment and loop requiredness and occurrence limits,
//! element requiredness, lengths, numeric/date/time forms and code lists,
//! and runs any [`edi_schema::Validator`] hooks attached to templates.
//! Findings are appended to the document's [`edi_ir::DocumentErrors`], so the
//! accumulator's minimum level applies here exactly as it does during parsing.

pub mod engine;
pub mod rules;

pub use engine::{validate_envelope, validate_segment, validate_transaction_set};
pub use rules::{RuleResult, validate_code_list, validate_data_type, validate_length, validate_value};
