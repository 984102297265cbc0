//! Visitor-style traversal over a parsed envelope

use crate::document::{Envelope, FunctionalGroup, TransactionSet};
use crate::node::{Group, Node, Segment};

/// Kind of container being entered or left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Loop,
    Table,
}

/// Trait for traversing the tree
pub trait Traversal {
    /// Visit a segment
    fn visit_segment(&mut self, segment: &Segment);

    fn enter_envelope(&mut self, _envelope: &Envelope) {}

    fn leave_envelope(&mut self, _envelope: &Envelope) {}

    fn enter_group(&mut self, _group: &FunctionalGroup) {}

    fn leave_group(&mut self, _group: &FunctionalGroup) {}

    fn enter_transaction_set(&mut self, _ts: &TransactionSet) {}

    fn leave_transaction_set(&mut self, _ts: &TransactionSet) {}

    /// Called when entering a loop or table
    fn enter(&mut self, _kind: GroupKind, _group: &Group) {}

    /// Called when leaving a loop or table
    fn leave(&mut self, _kind: GroupKind, _group: &Group) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

/// Walk an envelope in document order
pub fn walk_envelope<T: Traversal + ?Sized>(envelope: &Envelope, visitor: &mut T) {
    visitor.enter_envelope(envelope);
    if let Some(una) = &envelope.service_advice {
        visit(una, visitor);
    }
    if let Some(header) = &envelope.header {
        visit(header, visitor);
    }
    for group in &envelope.groups {
        if !visitor.should_continue() {
            return;
        }
        walk_group(group, visitor);
    }
    if let Some(trailer) = &envelope.trailer {
        visit(trailer, visitor);
    }
    visitor.leave_envelope(envelope);
}

/// Walk a functional group
pub fn walk_group<T: Traversal + ?Sized>(group: &FunctionalGroup, visitor: &mut T) {
    visitor.enter_group(group);
    if let Some(header) = &group.header {
        visit(header, visitor);
    }
    for ts in &group.transaction_sets {
        if !visitor.should_continue() {
            return;
        }
        walk_transaction_set(ts, visitor);
    }
    if let Some(trailer) = &group.trailer {
        visit(trailer, visitor);
    }
    visitor.leave_group(group);
}

/// Walk a transaction set, header to trailer
pub fn walk_transaction_set<T: Traversal + ?Sized>(ts: &TransactionSet, visitor: &mut T) {
    visitor.enter_transaction_set(ts);
    if let Some(header) = &ts.header {
        visit(header, visitor);
    }
    for node in &ts.body {
        walk_node(node, visitor);
    }
    if let Some(trailer) = &ts.trailer {
        visit(trailer, visitor);
    }
    visitor.leave_transaction_set(ts);
}

/// Walk a body node and its descendants
pub fn walk_node<T: Traversal + ?Sized>(node: &Node, visitor: &mut T) {
    if !visitor.should_continue() {
        return;
    }
    match node {
        Node::Segment(segment) => visitor.visit_segment(segment),
        Node::Loop(group) => walk_container(GroupKind::Loop, group, visitor),
        Node::Table(group) => walk_container(GroupKind::Table, group, visitor),
    }
}

fn walk_container<T: Traversal + ?Sized>(kind: GroupKind, group: &Group, visitor: &mut T) {
    visitor.enter(kind, group);
    for child in &group.children {
        walk_node(child, visitor);
    }
    visitor.leave(kind, group);
}

fn visit<T: Traversal + ?Sized>(segment: &Segment, visitor: &mut T) {
    if visitor.should_continue() {
        visitor.visit_segment(segment);
    }
}

/// Collect segments in document order
pub fn segments(envelope: &Envelope) -> Vec<&Segment> {
    let mut out = Vec::new();
    collect_envelope(envelope, &mut out);
    out
}

fn collect_envelope<'a>(envelope: &'a Envelope, out: &mut Vec<&'a Segment>) {
    out.extend(envelope.service_advice.iter());
    out.extend(envelope.header.iter());
    for group in &envelope.groups {
        out.extend(group.header.iter());
        for ts in &group.transaction_sets {
            out.extend(ts.header.iter());
            for node in &ts.body {
                collect_node(node, out);
            }
            out.extend(ts.trailer.iter());
        }
        out.extend(group.trailer.iter());
    }
    out.extend(envelope.trailer.iter());
}

fn collect_node<'a>(node: &'a Node, out: &mut Vec<&'a Segment>) {
    match node {
        Node::Segment(s) => out.push(s),
        Node::Loop(g) | Node::Table(g) => {
            for child in &g.children {
                collect_node(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Delimiters, Format};

    fn sample() -> Envelope {
        let mut env = Envelope::new(Format::Edifact, Delimiters::edifact());
        env.header = Some(Segment::new("UNB", "InterchangeHeader"));
        let mut ts = TransactionSet::new("ORDERS", "Order");
        ts.header = Some(Segment::new("UNH", "MessageHeader"));
        let mut table = Group::new("heading", "Heading");
        table.children.push(Node::Segment(Segment::new("BGM", "Bgm")));
        let mut lp = Group::new("SG2", "Party");
        lp.children.push(Node::Segment(Segment::new("NAD", "Nad")));
        table.children.push(Node::Loop(lp));
        ts.body.push(Node::Table(table));
        ts.trailer = Some(Segment::new("UNT", "MessageTrailer"));
        let mut group = FunctionalGroup::implicit();
        group.transaction_sets.push(ts);
        env.groups.push(group);
        env.trailer = Some(Segment::new("UNZ", "InterchangeTrailer"));
        env
    }

    struct Recorder {
        events: Vec<String>,
        limit: usize,
    }

    impl Traversal for Recorder {
        fn visit_segment(&mut self, segment: &Segment) {
            self.events.push(segment.id.clone());
        }

        fn enter(&mut self, kind: GroupKind, group: &Group) {
            self.events.push(format!("{kind:?}:{}", group.id));
        }

        fn should_continue(&self) -> bool {
            self.events.len() < self.limit
        }
    }

    #[test]
    fn test_walk_visits_in_document_order() {
        let env = sample();
        let mut rec = Recorder {
            events: Vec::new(),
            limit: usize::MAX,
        };
        walk_envelope(&env, &mut rec);
        assert_eq!(
            rec.events,
            vec!["UNB", "UNH", "Table:heading", "BGM", "Loop:SG2", "NAD", "UNT", "UNZ"]
        );
    }

    #[test]
    fn test_walk_stops_when_asked() {
        let env = sample();
        let mut rec = Recorder {
            events: Vec::new(),
            limit: 2,
        };
        walk_envelope(&env, &mut rec);
        assert_eq!(rec.events, vec!["UNB", "UNH"]);
    }

    #[test]
    fn test_segments_collects_all() {
        let env = sample();
        let ids: Vec<&str> = segments(&env).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["UNB", "UNH", "BGM", "NAD", "UNT", "UNZ"]);
    }
}
