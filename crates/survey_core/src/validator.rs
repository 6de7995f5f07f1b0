//! crates/survey_core/src/validator.rs
//!
//! Checks a free-text answer against the rule and format declared on its question.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{Format, Question, ValidationKind};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L} '\-]+$").expect("name pattern is valid"));

pub const EXPECTED_EMAIL: &str = "a valid email address (like example@domain.com)";
pub const EXPECTED_NAME: &str = "a name using only letters, spaces, hyphens and apostrophes";
pub const EXPECTED_NUMBER: &str = "a number between 1 and 10";
pub const EXPECTED_YES_NO: &str = "yes or no";
pub const EXPECTED_TEXT: &str = "a non-empty response";

/// Inclusive bounds accepted for `Format::Number`.
pub const NUMBER_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Which rule an answer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Empty,
    InvalidEmail,
    InvalidName,
    NotANumber,
    OutOfRange,
    NotYesNo,
    UnknownOption,
    MissingOptions,
}

/// A rejected answer, with a human-readable statement of what is accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}")]
pub struct ValidationFailure {
    pub kind: ValidationErrorKind,
    pub expected: String,
}

impl ValidationFailure {
    fn new(kind: ValidationErrorKind, expected: impl Into<String>) -> Self {
        Self {
            kind,
            expected: expected.into(),
        }
    }
}

pub type ValidationResult = Result<(), ValidationFailure>;

/// Validates `response` for `question`. Pure and deterministic.
pub fn validate(response: &str, question: &Question) -> ValidationResult {
    let response = response.trim();

    match question.validation {
        ValidationKind::Email => {
            return if EMAIL_RE.is_match(response) {
                Ok(())
            } else {
                Err(ValidationFailure::new(ValidationErrorKind::InvalidEmail, EXPECTED_EMAIL))
            };
        }
        ValidationKind::PersonName => {
            return if NAME_RE.is_match(response) {
                Ok(())
            } else {
                Err(ValidationFailure::new(ValidationErrorKind::InvalidName, EXPECTED_NAME))
            };
        }
        ValidationKind::Generic => {}
    }

    match question.format {
        Format::Number => match response.parse::<i64>() {
            Ok(value) if NUMBER_RANGE.contains(&value) => Ok(()),
            Ok(_) => Err(ValidationFailure::new(ValidationErrorKind::OutOfRange, EXPECTED_NUMBER)),
            Err(_) => Err(ValidationFailure::new(ValidationErrorKind::NotANumber, EXPECTED_NUMBER)),
        },
        Format::YesNo => match response.to_lowercase().as_str() {
            "yes" | "no" => Ok(()),
            _ => Err(ValidationFailure::new(ValidationErrorKind::NotYesNo, EXPECTED_YES_NO)),
        },
        Format::Text => {
            if response.is_empty() {
                Err(ValidationFailure::new(ValidationErrorKind::Empty, EXPECTED_TEXT))
            } else {
                Ok(())
            }
        }
        Format::Multiple => {
            let Some(options) = question.options.as_ref().filter(|o| !o.is_empty()) else {
                return Err(ValidationFailure::new(
                    ValidationErrorKind::MissingOptions,
                    "a question with configured options",
                ));
            };
            if options.contains_key(&response.to_uppercase()) {
                Ok(())
            } else {
                let labels: Vec<&str> = options.keys().map(String::as_str).collect();
                Err(ValidationFailure::new(
                    ValidationErrorKind::UnknownOption,
                    format!("One of: {}", labels.join(", ")),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(response: &str, question: &Question) -> Option<ValidationErrorKind> {
        validate(response, question).err().map(|f| f.kind)
    }

    #[test]
    fn number_accepts_only_integers_in_range() {
        let q = Question::new("Rate 1-10", Format::Number);
        assert_eq!(kind_of(" 7 ", &q), None);
        assert_eq!(kind_of("1", &q), None);
        assert_eq!(kind_of("10", &q), None);
        assert_eq!(kind_of("0", &q), Some(ValidationErrorKind::OutOfRange));
        assert_eq!(kind_of("15", &q), Some(ValidationErrorKind::OutOfRange));
        assert_eq!(kind_of("7.5", &q), Some(ValidationErrorKind::NotANumber));
        assert_eq!(kind_of("seven", &q), Some(ValidationErrorKind::NotANumber));

        let failure = validate("15", &q).unwrap_err();
        assert_eq!(failure.expected, "a number between 1 and 10");
    }

    #[test]
    fn yes_no_is_case_insensitive() {
        let q = Question::new("Would you recommend us?", Format::YesNo);
        assert_eq!(kind_of("YES", &q), None);
        assert_eq!(kind_of(" no\n", &q), None);
        assert_eq!(kind_of("maybe", &q), Some(ValidationErrorKind::NotYesNo));
        assert_eq!(kind_of("y", &q), Some(ValidationErrorKind::NotYesNo));
    }

    #[test]
    fn text_requires_content() {
        let q = Question::new("Anything else?", Format::Text);
        assert_eq!(kind_of("sure", &q), None);
        assert_eq!(kind_of("   ", &q), Some(ValidationErrorKind::Empty));
    }

    #[test]
    fn multiple_matches_labels_case_insensitively() {
        let q = Question::multiple("Favourite colour?", [("A", "Red"), ("B", "Blue")]);
        assert_eq!(kind_of("b", &q), None);
        assert_eq!(kind_of(" A ", &q), None);

        let failure = validate("C", &q).unwrap_err();
        assert_eq!(failure.kind, ValidationErrorKind::UnknownOption);
        assert_eq!(failure.expected, "One of: A, B");

        let mut missing = q.clone();
        missing.options = None;
        assert_eq!(kind_of("A", &missing), Some(ValidationErrorKind::MissingOptions));
    }

    #[test]
    fn email_rule_overrides_format() {
        let q = Question::new("What's your email?", Format::Number);
        assert_eq!(kind_of("jane@example.com", &q), None);
        assert_eq!(kind_of("jane@example", &q), Some(ValidationErrorKind::InvalidEmail));
        assert_eq!(kind_of("jane.example.com", &q), Some(ValidationErrorKind::InvalidEmail));
        assert_eq!(kind_of("7", &q), Some(ValidationErrorKind::InvalidEmail));
    }

    #[test]
    fn name_rule_allows_letters_spaces_hyphens_apostrophes() {
        let q = Question::new("What is your name?", Format::Text);
        assert_eq!(kind_of("Mary-Jane O'Neil", &q), None);
        assert_eq!(kind_of("Zoë", &q), None);
        assert_eq!(kind_of("John123", &q), Some(ValidationErrorKind::InvalidName));
        assert_eq!(kind_of("", &q), Some(ValidationErrorKind::InvalidName));
    }

    #[test]
    fn declared_rule_wins_over_wording() {
        let q = Question::new("Name a number", Format::Number).with_validation(ValidationKind::Generic);
        assert_eq!(kind_of("4", &q), None);
    }

    #[test]
    fn validate_is_deterministic() {
        let q = Question::new("Rate 1-10", Format::Number);
        assert_eq!(validate("abc", &q), validate("abc", &q));
        assert_eq!(validate("3", &q), validate("3", &q));
    }
}
