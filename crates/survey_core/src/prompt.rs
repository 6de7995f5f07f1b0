//! crates/survey_core/src/prompt.rs
//!
//! Structured prompt descriptors and their plain-text rendering.
//!
//! The engine only ever hands out these descriptors; turning them into chat
//! text is done here, statically, so a gateway can also choose its own wording.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Answer, CompletedSurvey, Format, Question, ValidationKind};
use crate::validator::ValidationFailure;

/// Everything needed to ask one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub question_text: String,
    pub format: Format,
    pub options: Option<BTreeMap<String, String>>,
    pub validation: ValidationKind,
    /// Zero-based position of the question in its survey.
    pub position: usize,
    pub total: usize,
}

impl Prompt {
    pub fn for_question(question: &Question, position: usize, total: usize) -> Self {
        Self {
            question_text: question.text.clone(),
            format: question.format,
            options: question.options.clone(),
            validation: question.validation,
            position,
            total,
        }
    }

    /// Static answering hint derived from the question's rule and format.
    pub fn instructions(&self) -> String {
        match self.validation {
            ValidationKind::PersonName => return String::new(),
            ValidationKind::Email => return "(like example@domain.com)".to_string(),
            ValidationKind::Generic => {}
        }
        match self.format {
            Format::Text => String::new(),
            Format::Number => "(1-10)".to_string(),
            Format::YesNo => "(yes/no)".to_string(),
            Format::Multiple => match &self.options {
                Some(options) if !options.is_empty() => {
                    let choices: Vec<String> = options
                        .iter()
                        .map(|(label, choice)| format!("{label}) {choice}"))
                        .collect();
                    format!("Options: {}", choices.join(", "))
                }
                _ => String::new(),
            },
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instructions = self.instructions();
        if instructions.is_empty() {
            write!(f, "{}", self.question_text)
        } else {
            write!(f, "{} {}", self.question_text, instructions)
        }
    }
}

/// Text sent back when an answer is rejected: the failure, then the question again.
pub fn render_validation_error(failure: &ValidationFailure, prompt: &Prompt) -> String {
    format!(
        "Sorry, that answer isn't valid. Please reply with {}.\n\n{}",
        failure.expected, prompt
    )
}

/// Text sent once every question has been answered.
pub fn render_summary(completed: &CompletedSurvey) -> String {
    let mut message =
        String::from("Thank you for completing the survey! Here is a summary of your responses:\n");
    for (index, Answer { question_text, raw_response, .. }) in completed.answers.iter().enumerate() {
        message.push_str(&format!("\n{}. {}\n   {}", index + 1, question_text, raw_response));
    }
    message
}
