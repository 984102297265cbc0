//! Steps every format parser shares around the grammar

use crate::handler::{ParseStatus, ParsedDocument};
use crate::tokenizer::Tokenizer;
use crate::{Error, ParserConfig, Result};
use edi_ir::{DocumentErrors, Envelope, ErrorCode, ErrorLevel, Segment};
use edi_schema::{SchemaLookup, TemplateEnvelope, TemplateTransactionSet, TransactionSetKey};
use edi_validation::validate_envelope;
use std::sync::Arc;
use tracing::{debug, info};

/// Find the template for a transaction set
///
/// A missing definition is recorded as a fatal soft error and yields `None`,
/// unless `throw_on_error` is set.
///
/// # Errors
///
/// [`Error::UnknownTransactionSet`] with the errors so far when
/// `throw_on_error` is set; [`Error::Schema`] for lookup failures other than
/// a missing definition.
pub fn resolve_transaction_set<L, R>(
    lookup: &L,
    key: &TransactionSetKey,
    tokenizer: &mut Tokenizer<R>,
    config: &ParserConfig,
    owner: &str,
) -> Result<Option<Arc<TemplateTransactionSet>>>
where
    L: SchemaLookup + ?Sized,
{
    match lookup.transaction_set(key) {
        Ok(template) => {
            debug!("Resolved {} to template {}", key, template.name);
            Ok(Some(template))
        }
        Err(edi_schema::Error::NotFound(_)) => {
            tokenizer.report_error(
                format!("No transaction set definition for {key}"),
                owner,
                ErrorCode::UnknownTransactionSet,
                Some(&key.id),
                ErrorLevel::Fatal,
            );
            if config.throw_on_error {
                return Err(Error::UnknownTransactionSet {
                    key: key.to_string(),
                    errors: tokenizer.errors().clone(),
                });
            }
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Compare the count a trailer declares at `position` with `actual`
///
/// The tokenizer must still stand on the trailer so the error is located there.
pub fn verify_count<R>(tokenizer: &mut Tokenizer<R>, owner: &str, trailer: &Segment, position: usize, actual: usize) -> bool {
    let declared = trailer.text(position).unwrap_or_default();
    if declared.trim().parse::<usize>().ok() == Some(actual) {
        return true;
    }
    tokenizer.report_error(
        format!("{} declares a count of '{declared}' but {actual} were found", trailer.id),
        owner,
        ErrorCode::ControlCountMismatch,
        Some(declared),
        ErrorLevel::Integrity,
    );
    false
}

/// Compare the control reference a trailer repeats with the header's
pub fn verify_reference<R>(
    tokenizer: &mut Tokenizer<R>,
    owner: &str,
    trailer: &Segment,
    position: usize,
    expected: Option<&str>,
) -> bool {
    let declared = trailer.text(position).unwrap_or_default();
    if declared == expected.unwrap_or_default() {
        return true;
    }
    tokenizer.report_error(
        format!(
            "{} control reference '{declared}' does not match header '{}'",
            trailer.id,
            expected.unwrap_or_default()
        ),
        owner,
        ErrorCode::ControlReferenceMismatch,
        Some(declared),
        ErrorLevel::Integrity,
    );
    false
}

/// Record that a container ended without its trailer
pub fn missing_trailer<R>(tokenizer: &mut Tokenizer<R>, owner: &str, trailer: &str) {
    let found = match tokenizer.segment_id() {
        "" => "end of input".to_string(),
        id => id.to_string(),
    };
    tokenizer.report_error(
        format!("Expected {trailer} but found {found}"),
        owner,
        ErrorCode::MissingTrailer,
        Some(trailer),
        ErrorLevel::Integrity,
    );
}

/// Run the validation pass and apply the rejection policy
///
/// Validation runs only for a completed parse with `auto_validate` set.
///
/// # Errors
///
/// [`Error::Rejected`] when `fail_on_errors` is set and any error was recorded.
pub fn finish_document<L: SchemaLookup + ?Sized>(
    envelope: Envelope,
    mut errors: DocumentErrors,
    status: ParseStatus,
    config: &ParserConfig,
    envelope_template: Option<&TemplateEnvelope>,
    lookup: &L,
) -> Result<ParsedDocument> {
    if status == ParseStatus::Completed && config.auto_validate {
        validate_envelope(&envelope, envelope_template, lookup, &mut errors);
    }
    info!(
        format = %envelope.format,
        transaction_sets = envelope.transaction_set_count(),
        errors = errors.len(),
        "Parse finished"
    );
    if config.fail_on_errors && !errors.is_empty() {
        return Err(Error::Rejected { errors });
    }
    Ok(ParsedDocument {
        envelope,
        errors,
        status,
    })
}
