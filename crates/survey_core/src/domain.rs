//! crates/survey_core/src/domain.rs
//!
//! Defines the pure, core data structures for the survey bot.
//! Questions are serializable because they travel unchanged between the
//! HTTP surface, the repository and the in-memory session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::SurveyError;

//=========================================================================================
// Questions
//=========================================================================================

/// The declared answer type of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Text,
    Number,
    YesNo,
    Multiple,
}

/// The validation rule attached to a question when it is authored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    #[default]
    Generic,
    Email,
    PersonName,
}

impl ValidationKind {
    /// Derives a rule from the wording of a question. Only used at authoring
    /// time, for questions submitted without an explicit rule.
    pub fn infer_from_text(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if lowered.contains("email") {
            ValidationKind::Email
        } else if lowered.contains("name") {
            ValidationKind::PersonName
        } else {
            ValidationKind::Generic
        }
    }
}

/// A single survey question. Immutable once a survey has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub format: Format,
    /// Choice labels ("A", "B", ...) mapped to their human-readable text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub validation: ValidationKind,
}

impl Question {
    /// Creates a question, deriving its validation rule from the wording.
    pub fn new(text: impl Into<String>, format: Format) -> Self {
        let text = text.into();
        let validation = ValidationKind::infer_from_text(&text);
        Self {
            text,
            format,
            options: None,
            validation,
        }
    }

    /// Creates a multiple-choice question from `(label, choice)` pairs.
    pub fn multiple<I, L, C>(text: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (L, C)>,
        L: Into<String>,
        C: Into<String>,
    {
        let options = options
            .into_iter()
            .map(|(label, choice)| (label.into().to_uppercase(), choice.into()))
            .collect();
        Self {
            options: Some(options),
            ..Self::new(text, Format::Multiple)
        }
    }

    /// Overrides the derived validation rule.
    pub fn with_validation(mut self, validation: ValidationKind) -> Self {
        self.validation = validation;
        self
    }

    /// Checks that the question is well formed enough to be asked.
    pub fn check(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("question text must not be empty".to_string());
        }
        match (self.format, &self.options) {
            (Format::Multiple, None) => {
                Err("multiple-choice questions need options".to_string())
            }
            (Format::Multiple, Some(options)) if options.is_empty() => {
                Err("multiple-choice questions need options".to_string())
            }
            (Format::Multiple, Some(options)) => {
                if options.keys().any(|label| label.trim().is_empty()) {
                    Err("option labels must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            (_, Some(_)) => Err("only multiple-choice questions take options".to_string()),
            (_, None) => Ok(()),
        }
    }
}

/// Checks a whole question list before it is stored or used to start a survey.
pub fn check_questions(questions: &[Question]) -> Result<(), SurveyError> {
    if questions.is_empty() {
        return Err(SurveyError::NoQuestions);
    }
    for (index, question) in questions.iter().enumerate() {
        question
            .check()
            .map_err(|reason| SurveyError::InvalidQuestion { index, reason })?;
    }
    Ok(())
}

//=========================================================================================
// Answers and Sessions
//=========================================================================================

/// One validated answer. Created exactly once per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_text: String,
    pub raw_response: String,
    pub format: Format,
    pub answered_at: DateTime<Utc>,
}

/// One user's in-progress survey.
///
/// `cursor` always equals `answers.len()` and never exceeds `questions.len()`;
/// `record_answer` is the only way to move it.
#[derive(Debug, Clone)]
pub struct SurveySession {
    owner_id: String,
    api_key: Option<String>,
    questions: Vec<Question>,
    cursor: usize,
    answers: Vec<Answer>,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl SurveySession {
    pub fn new(owner_id: impl Into<String>, questions: Vec<Question>, api_key: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            owner_id: owner_id.into(),
            api_key,
            questions,
            cursor: 0,
            answers: Vec::new(),
            started_at: now,
            last_activity_at: now,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// The question the user is expected to answer next, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.questions.len()
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_activity_at = at;
    }

    /// Appends an answer to the current question and advances the cursor.
    /// Returns `false` without changes when the survey is already complete.
    pub fn record_answer(&mut self, raw_response: impl Into<String>, at: DateTime<Utc>) -> bool {
        let Some(question) = self.questions.get(self.cursor) else {
            return false;
        };
        self.answers.push(Answer {
            question_text: question.text.clone(),
            raw_response: raw_response.into(),
            format: question.format,
            answered_at: at,
        });
        self.cursor += 1;
        self.last_activity_at = at;
        true
    }

    /// Consumes a finished session into its completion record.
    pub fn into_completed(self, completed_at: DateTime<Utc>) -> CompletedSurvey {
        CompletedSurvey {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            api_key: self.api_key,
            answers: self.answers,
            started_at: self.started_at,
            completed_at,
        }
    }
}

//=========================================================================================
// Records kept by the boundary
//=========================================================================================

/// A finished survey, kept so the survey owner can fetch the responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSurvey {
    pub id: Uuid,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub answers: Vec<Answer>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// An API key issued to a survey author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn generate() -> Self {
        Self {
            key: format!("sk_{}", Uuid::new_v4().simple()),
            created_at: Utc::now(),
        }
    }
}
