//! User-supplied validation hooks attached to segment and loop templates

use edi_ir::{DocumentErrors, Node};
use std::fmt;

/// Extra checks run against a parsed node after the structural pass
pub trait Validator: Send + Sync + fmt::Debug {
    /// Inspect `node`, recording problems in `errors`; return `false` to reject it
    fn validate(&self, node: &Node, errors: &mut DocumentErrors) -> bool;
}

/// A [`Validator`] backed by a closure
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&Node, &mut DocumentErrors) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").field("name", &self.name).finish()
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Node, &mut DocumentErrors) -> bool + Send + Sync,
{
    fn validate(&self, node: &Node, errors: &mut DocumentErrors) -> bool {
        (self.check)(node, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{ErrorCode, ErrorLevel, ErrorRecord, Segment};

    #[test]
    fn test_closure_validator_records_errors() {
        let v = FnValidator::new("no-empty-bgm", |node: &Node, errors: &mut DocumentErrors| {
            let ok = node.as_segment().is_some_and(|s| s.text(2).is_some());
            if !ok {
                errors.add(ErrorRecord::new(
                    ErrorCode::ValidatorRejected,
                    ErrorLevel::Requirement,
                    "document number required",
                ));
            }
            ok
        });
        let mut errors = DocumentErrors::new(ErrorLevel::Situation);
        assert!(!v.validate(&Node::Segment(Segment::new("BGM", "Bgm")), &mut errors));
        assert_eq!(errors.len(), 1);
        assert!(format!("{v:?}").contains("no-empty-bgm"));
    }
}
