//! Notification interface through which parsers report structure

use edi_ir::{DocumentErrors, Envelope, FunctionalGroup, Segment, TransactionSet};
use serde::Serialize;

/// Answer of a handler callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    #[default]
    Continue,
    /// Stop parsing after this notification
    Halt,
}

impl Flow {
    pub fn is_halt(self) -> bool {
        self == Flow::Halt
    }
}

/// Receives each container as soon as it is built
///
/// Every method defaults to [`Flow::Continue`]; implement only what you need.
/// The parser checks the returned flow after every single dispatch.
///
/// Segment callbacks fire for transaction-set body segments only. Service
/// segments (interchange, group and message headers and trailers) are not
/// dispatched on their own; they arrive as `header` and `trailer` of the
/// envelope, group or transaction set handed to the container callbacks.
pub trait DocumentHandler {
    fn start_envelope(&mut self, _envelope: &Envelope) -> Flow {
        Flow::Continue
    }

    /// Called once the envelope trailer is read; a halt marks the parse halted
    fn end_envelope(&mut self, _envelope: &Envelope) -> Flow {
        Flow::Continue
    }

    fn start_functional_group(&mut self, _group: &FunctionalGroup) -> Flow {
        Flow::Continue
    }

    fn end_functional_group(&mut self, _group: &FunctionalGroup) -> Flow {
        Flow::Continue
    }

    fn start_transaction_set(&mut self, _ts: &TransactionSet) -> Flow {
        Flow::Continue
    }

    fn end_transaction_set(&mut self, _ts: &TransactionSet) -> Flow {
        Flow::Continue
    }

    fn start_segment(&mut self, _segment: &Segment) -> Flow {
        Flow::Continue
    }

    fn end_segment(&mut self, _segment: &Segment) -> Flow {
        Flow::Continue
    }
}

/// Handler that accepts everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl DocumentHandler for NullHandler {}

impl<H: DocumentHandler + ?Sized> DocumentHandler for &mut H {
    fn start_envelope(&mut self, envelope: &Envelope) -> Flow {
        (**self).start_envelope(envelope)
    }

    fn end_envelope(&mut self, envelope: &Envelope) -> Flow {
        (**self).end_envelope(envelope)
    }

    fn start_functional_group(&mut self, group: &FunctionalGroup) -> Flow {
        (**self).start_functional_group(group)
    }

    fn end_functional_group(&mut self, group: &FunctionalGroup) -> Flow {
        (**self).end_functional_group(group)
    }

    fn start_transaction_set(&mut self, ts: &TransactionSet) -> Flow {
        (**self).start_transaction_set(ts)
    }

    fn end_transaction_set(&mut self, ts: &TransactionSet) -> Flow {
        (**self).end_transaction_set(ts)
    }

    fn start_segment(&mut self, segment: &Segment) -> Flow {
        (**self).start_segment(segment)
    }

    fn end_segment(&mut self, segment: &Segment) -> Flow {
        (**self).end_segment(segment)
    }
}

/// Whether the grammar ran to the interchange trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseStatus {
    Completed,
    /// A handler asked to stop; the envelope holds what was built so far
    Halted,
}

/// Result of a parse that did not hit a fatal condition
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub envelope: Envelope,
    pub errors: DocumentErrors,
    pub status: ParseStatus,
}

impl ParsedDocument {
    pub fn is_complete(&self) -> bool {
        self.status == ParseStatus::Completed
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StopAt(&'static str, usize);

    impl DocumentHandler for StopAt {
        fn start_segment(&mut self, segment: &Segment) -> Flow {
            self.1 += 1;
            if segment.id == self.0 { Flow::Halt } else { Flow::Continue }
        }
    }

    #[test]
    fn test_default_methods_continue() {
        let mut h = NullHandler;
        assert_eq!(h.start_segment(&Segment::new("BGM", "BGM")), Flow::Continue);
        assert!(!h.end_transaction_set(&TransactionSet::new("ORDERS", "")).is_halt());
    }

    fn drive<H: DocumentHandler>(mut handler: H, ids: &[&str]) -> usize {
        ids.iter()
            .take_while(|id| !handler.start_segment(&Segment::new(**id, "")).is_halt())
            .count()
    }

    #[test]
    fn test_handler_through_mut_reference() {
        let mut stop = StopAt("DTM", 0);
        assert_eq!(drive(&mut stop, &["BGM", "DTM", "NAD"]), 1);
        assert_eq!(stop.1, 2);
    }
}
