//! Entry hash and debit/credit totals carried by the control records

use edi_ir::traversal::{Traversal, walk_transaction_set};
use edi_ir::{Segment, TransactionSet};

/// The entry hash keeps only its ten low-order digits
const HASH_MODULUS: usize = 10_000_000_000;

/// Sums over the entry detail records of one batch or a whole file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Sum of the receiving DFI identifications, modulo 10^10
    pub entry_hash: usize,
    /// Debit amounts in cents
    pub debits: usize,
    /// Credit amounts in cents
    pub credits: usize,
}

impl Totals {
    /// Totals of the entries in a batch
    pub fn of(batch: &TransactionSet) -> Self {
        let mut totals = Self::default();
        walk_transaction_set(batch, &mut totals);
        totals
    }

    pub fn add(&mut self, other: Totals) {
        self.entry_hash = (self.entry_hash + other.entry_hash) % HASH_MODULUS;
        self.debits += other.debits;
        self.credits += other.credits;
    }

    fn entry(&mut self, entry: &Segment) {
        let number = |position| entry.text(position).and_then(|t| t.trim().parse::<usize>().ok());
        self.entry_hash = (self.entry_hash + number(3).unwrap_or_default()) % HASH_MODULUS;
        let amount = number(6).unwrap_or_default();
        // the second digit of the transaction code tells credits from debits
        match entry.text(2).and_then(|code| code.as_bytes().get(1).copied()) {
            Some(b'2'..=b'4') => self.credits += amount,
            Some(b'7'..=b'9') => self.debits += amount,
            _ => {}
        }
    }
}

impl Traversal for Totals {
    fn visit_segment(&mut self, segment: &Segment) {
        if segment.id == "6" {
            self.entry(segment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{DataElement, Field, Node};

    fn entry(code: &str, rdfi: &str, amount: &str) -> Node {
        let mut seg = Segment::new("6", "EntryDetail");
        seg.set_field(Field::Data(DataElement::new("602", "TransactionCode", 2, code)));
        seg.set_field(Field::Data(DataElement::new("603", "ReceivingDfi", 3, rdfi)));
        seg.set_field(Field::Data(DataElement::new("606", "Amount", 6, amount)));
        Node::Segment(seg)
    }

    #[test]
    fn test_batch_totals() {
        let mut batch = TransactionSet::new("PPD", "PPD batch");
        batch.body.push(entry("22", "09100001", "0000012500"));
        batch.body.push(entry("27", "99999999", "0000000100"));
        batch.body.push(entry("23", "00000001", "0000000000"));
        let totals = Totals::of(&batch);
        assert_eq!(totals.entry_hash, 9_100_001 + 99_999_999 + 1);
        assert_eq!(totals.credits, 12_500);
        assert_eq!(totals.debits, 100);
    }

    #[test]
    fn test_hash_wraps() {
        let mut totals = Totals {
            entry_hash: HASH_MODULUS - 1,
            ..Totals::default()
        };
        totals.add(Totals {
            entry_hash: 2,
            debits: 5,
            credits: 0,
        });
        assert_eq!(totals.entry_hash, 1);
        assert_eq!(totals.debits, 5);
    }
}
