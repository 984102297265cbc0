//! Content-based choice between templates competing for the same segment
//!
//! Only the first required coded field a template declares is consulted. A
//! template without one cannot be prevalidated and the caller falls back to
//! grammar position.

use crate::engine::element_widths;
use crate::tokenizer::{Tokenizer, Tokens};
use edi_schema::{ElementContainer, TemplateDataElement, TemplateElement};

/// Outcome of probing the current segment against a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// The deciding field rejected the live value
    Mismatch(String),
    /// The template has no required coded field
    Undecidable,
}

/// The field that decides a match: (element position, component position, template)
fn deciding_field(elements: &ElementContainer) -> Option<(usize, Option<usize>, &TemplateDataElement)> {
    elements.iter().find_map(|element| match element {
        TemplateElement::Data(d) if d.required && d.is_coded() => Some((d.position, None, d)),
        TemplateElement::Composite(c) if c.required => c.elements.iter().find_map(|inner| match inner {
            TemplateElement::Data(d) if d.required && d.is_coded() => {
                Some((c.position, Some(d.position), d))
            }
            _ => None,
        }),
        _ => None,
    })
}

pub fn can_prevalidate(elements: &ElementContainer) -> bool {
    deciding_field(elements).is_some()
}

/// Check the tokenizer's current segment against a candidate
///
/// The segment cursor is rewound to its start afterwards whatever the outcome.
pub fn is_this_you<R>(tokenizer: &mut Tokenizer<R>, elements: &ElementContainer) -> Verdict {
    let Some((position, component, template)) = deciding_field(elements) else {
        return Verdict::Undecidable;
    };

    let value = if tokenizer.is_fixed_width() {
        tokenizer.with_layout(&element_widths(elements), |t| {
            read_field(t, position, component).trim_end().to_string()
        })
    } else {
        let value = read_field(tokenizer, position, component);
        tokenizer.reset_segment();
        value
    };
    let segment = tokenizer.segment_id().to_string();

    let place = match component {
        Some(c) => format!("{segment}{position:02}-{c:02}"),
        None => format!("{segment}{position:02}"),
    };
    let Some(codes) = template.codes.as_ref() else {
        return Verdict::Undecidable;
    };
    if value.is_empty() {
        return Verdict::Mismatch(format!("{place}: required element {} is empty", template.id));
    }
    if codes.is_valid(&value) {
        Verdict::Match
    } else {
        Verdict::Mismatch(format!("{place}: {}", codes.describe_rejection(&value)))
    }
}

/// Unescaped text of the deciding field, reading from the segment start
fn read_field<R>(tokenizer: &mut Tokenizer<R>, position: usize, component: Option<usize>) -> String {
    tokenizer.reset_segment();
    let mut field = String::new();
    while tokenizer.element_position() < position && tokenizer.has_more_elements() {
        field = tokenizer.next_data_element().to_string();
    }
    if tokenizer.element_position() < position {
        field.clear();
    }
    let raw = match component {
        Some(component) => tokenizer
            .make_subfield_tokenizer()
            .token_at(component.saturating_sub(1))
            .unwrap_or_default(),
        None => field,
    };
    tokenizer.unescape(&raw)
}

/// Why the current segment does not fit the template, if it does not
pub fn why_not_you<R>(tokenizer: &mut Tokenizer<R>, elements: &ElementContainer) -> Option<String> {
    match is_this_you(tokenizer, elements) {
        Verdict::Mismatch(reason) => Some(reason),
        Verdict::Match | Verdict::Undecidable => None,
    }
}
