//! Element-level validation rules

use chrono::{NaiveDate, NaiveTime};
use edi_ir::ErrorCode;
use edi_schema::{DataType, TemplateDataElement};
use regex::Regex;
use std::sync::LazyLock;

static INTEGER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^-?[0-9]+$").ok());
static DECIMAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^-?([0-9]+([.,][0-9]*)?|[.,][0-9]+)$").ok());

fn is_match(pattern: Option<&Regex>, value: &str) -> bool {
    pattern.is_some_and(|re| re.is_match(value))
}

/// Outcome of one rule applied to one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    Valid,
    Invalid { code: ErrorCode, message: String },
}

impl RuleResult {
    fn invalid(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Length as counted for `data_type`: sign and decimal mark do not count for numerics
#[must_use]
pub fn significant_length(value: &str, data_type: DataType) -> usize {
    match data_type {
        DataType::Numeric(_) | DataType::Decimal => {
            value.chars().filter(char::is_ascii_digit).count()
        }
        _ => value.chars().count(),
    }
}

/// Validate length constraints
#[must_use]
pub fn validate_length(value: &str, template: &TemplateDataElement) -> RuleResult {
    let len = significant_length(value, template.data_type);
    if len < template.min_length {
        return RuleResult::invalid(
            ErrorCode::ElementTooShort,
            format!(
                "Element {} length {len} is less than minimum {}",
                template.id, template.min_length
            ),
        );
    }
    if template.max_length > 0 && len > template.max_length {
        return RuleResult::invalid(
            ErrorCode::ElementTooLong,
            format!(
                "Element {} length {len} exceeds maximum {}",
                template.id, template.max_length
            ),
        );
    }
    RuleResult::Valid
}

/// Validate the lexical form required by the data type
#[must_use]
pub fn validate_data_type(value: &str, data_type: DataType) -> RuleResult {
    match data_type {
        DataType::Numeric(_) if !is_match(INTEGER.as_ref(), value) => RuleResult::invalid(
            ErrorCode::InvalidCharacter,
            format!("Value '{value}' is not a valid integer"),
        ),
        DataType::Decimal if !is_match(DECIMAL.as_ref(), value) => RuleResult::invalid(
            ErrorCode::InvalidCharacter,
            format!("Value '{value}' is not a valid decimal"),
        ),
        DataType::Date if !is_date(value) => RuleResult::invalid(
            ErrorCode::InvalidDate,
            format!("Value '{value}' is not a valid date (expected CCYYMMDD or YYMMDD)"),
        ),
        DataType::Time if !is_time(value) => RuleResult::invalid(
            ErrorCode::InvalidTime,
            format!("Value '{value}' is not a valid time (expected HHMM or HHMMSS)"),
        ),
        _ => RuleResult::Valid,
    }
}

fn is_date(value: &str) -> bool {
    let format = match value.len() {
        8 => "%Y%m%d",
        6 => "%y%m%d",
        _ => return false,
    };
    value.bytes().all(|b| b.is_ascii_digit()) && NaiveDate::parse_from_str(value, format).is_ok()
}

fn is_time(value: &str) -> bool {
    let format = match value.len() {
        4 => "%H%M",
        6 => "%H%M%S",
        _ => return false,
    };
    value.bytes().all(|b| b.is_ascii_digit()) && NaiveTime::parse_from_str(value, format).is_ok()
}

/// Validate against the element's code list, if it is a coded element
#[must_use]
pub fn validate_code_list(value: &str, template: &TemplateDataElement) -> RuleResult {
    match &template.codes {
        Some(list) if template.data_type == DataType::Identifier && !list.is_valid(value) => {
            RuleResult::invalid(ErrorCode::InvalidCodeValue, list.describe_rejection(value))
        }
        _ => RuleResult::Valid,
    }
}

/// Run every value rule for a present, non-empty element
#[must_use]
pub fn validate_value(value: &str, template: &TemplateDataElement) -> Vec<RuleResult> {
    [
        validate_length(value, template),
        validate_data_type(value, template.data_type),
        validate_code_list(value, template),
    ]
    .into_iter()
    .filter(|r| !r.is_valid())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_schema::CodeList;
    use std::sync::Arc;

    fn element(data_type: DataType, min: usize, max: usize) -> TemplateDataElement {
        TemplateDataElement::new("E", "Element", 1, data_type, min, max)
    }

    #[test]
    fn test_length_bounds() {
        let t = element(DataType::Alphanumeric, 2, 4);
        assert!(validate_length("ab", &t).is_valid());
        assert!(matches!(
            validate_length("a", &t),
            RuleResult::Invalid { code: ErrorCode::ElementTooShort, .. }
        ));
        assert!(matches!(
            validate_length("abcde", &t),
            RuleResult::Invalid { code: ErrorCode::ElementTooLong, .. }
        ));
    }

    #[test]
    fn test_numeric_length_ignores_sign_and_mark() {
        let t = element(DataType::Decimal, 1, 3);
        assert!(validate_length("-1.25", &t).is_valid());
        assert_eq!(significant_length("-1,5", DataType::Decimal), 2);
    }

    #[test]
    fn test_numeric_forms() {
        assert!(validate_data_type("0042", DataType::Numeric(2)).is_valid());
        assert!(!validate_data_type("4.2", DataType::Numeric(2)).is_valid());
        assert!(validate_data_type("4.2", DataType::Decimal).is_valid());
        assert!(validate_data_type("4,2", DataType::Decimal).is_valid());
        assert!(validate_data_type(".5", DataType::Decimal).is_valid());
        assert!(!validate_data_type("4.2.1", DataType::Decimal).is_valid());
        assert!(!validate_data_type("abc", DataType::Decimal).is_valid());
    }

    #[test]
    fn test_dates_and_times() {
        assert!(validate_data_type("20240229", DataType::Date).is_valid());
        assert!(validate_data_type("240115", DataType::Date).is_valid());
        assert!(matches!(
            validate_data_type("20230229", DataType::Date),
            RuleResult::Invalid { code: ErrorCode::InvalidDate, .. }
        ));
        assert!(!validate_data_type("2024-01-15", DataType::Date).is_valid());
        assert!(validate_data_type("2359", DataType::Time).is_valid());
        assert!(validate_data_type("235959", DataType::Time).is_valid());
        assert!(matches!(
            validate_data_type("2460", DataType::Time),
            RuleResult::Invalid { code: ErrorCode::InvalidTime, .. }
        ));
    }

    #[test]
    fn test_code_list_only_for_identifiers() {
        let codes = Arc::new(CodeList::with_codes("1001", ["220"]));
        let coded = element(DataType::Identifier, 1, 3).with_codes(Arc::clone(&codes));
        assert!(validate_code_list("220", &coded).is_valid());
        assert!(!validate_code_list("999", &coded).is_valid());

        let text = element(DataType::Alphanumeric, 1, 3).with_codes(codes);
        assert!(validate_code_list("999", &text).is_valid());
    }

    #[test]
    fn test_validate_value_collects_failures() {
        let codes = Arc::new(CodeList::with_codes("1001", ["220"]));
        let coded = element(DataType::Identifier, 3, 3).with_codes(codes);
        let failures = validate_value("9", &coded);
        assert_eq!(failures.len(), 2);
        assert!(validate_value("220", &coded).is_empty());
    }
}
