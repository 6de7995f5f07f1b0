//! crates/survey_core/src/engine.rs
//!
//! The survey progression engine. Each inbound message moves a session through
//! `NoSession -> AwaitingAnswer(0) -> ... -> AwaitingAnswer(n-1) -> Completed`,
//! and an invalid answer leaves it where it is.
//!
//! The engine never talks to a gateway. It returns an `OutboundAction` and the
//! caller decides how to deliver it.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::domain::{check_questions, CompletedSurvey, Question, SurveySession};
use crate::error::SurveyError;
use crate::prompt::{render_summary, render_validation_error, Prompt};
use crate::store::{SessionFate, SessionStore};
use crate::validator::{validate, ValidationFailure};

/// What the boundary should send back to the user after one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// The answer was rejected; re-ask the same question.
    SendValidationError {
        failure: ValidationFailure,
        prompt: Prompt,
    },
    /// The answer was accepted; ask the next question.
    SendNextPrompt(Prompt),
    /// The last answer was accepted; the session is gone.
    SendCompletionSummary(CompletedSurvey),
}

impl OutboundAction {
    /// Renders the action as chat text.
    pub fn message(&self) -> String {
        match self {
            OutboundAction::SendValidationError { failure, prompt } => {
                render_validation_error(failure, prompt)
            }
            OutboundAction::SendNextPrompt(prompt) => prompt.to_string(),
            OutboundAction::SendCompletionSummary(completed) => render_summary(completed),
        }
    }
}

/// Drives surveys against an injected session store.
#[derive(Clone)]
pub struct SurveyEngine {
    store: Arc<dyn SessionStore>,
}

impl SurveyEngine {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Seeds a session for `owner_id` and returns the first prompt.
    pub fn start_survey(
        &self,
        owner_id: &str,
        questions: Vec<Question>,
        api_key: Option<String>,
    ) -> Result<Prompt, SurveyError> {
        check_questions(&questions)?;
        let first = Prompt::for_question(&questions[0], 0, questions.len());
        self.store
            .insert_new(SurveySession::new(owner_id, questions, api_key))?;
        Ok(first)
    }

    /// Handles one inbound message. Returns `None` when the user has no survey.
    pub fn advance(&self, owner_id: &str, incoming: &str) -> Option<OutboundAction> {
        let mut action = None;
        let found = self.store.with_session(owner_id, &mut |session| {
            let (outcome, fate) = step(session, incoming);
            action = Some(outcome);
            fate
        });
        if found {
            action
        } else {
            None
        }
    }

    /// Abandons the owner's survey, if any.
    pub fn cancel(&self, owner_id: &str) -> Option<SurveySession> {
        self.store.remove(owner_id)
    }

    /// Drops sessions idle for longer than `max_idle`.
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<String> {
        self.store.remove_idle(Utc::now() - max_idle)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }
}

fn step(session: &mut SurveySession, incoming: &str) -> (OutboundAction, SessionFate) {
    let now = Utc::now();
    let total = session.questions().len();

    let Some(question) = session.current_question() else {
        // A complete session should already have been removed.
        let completed = session.clone().into_completed(now);
        return (OutboundAction::SendCompletionSummary(completed), SessionFate::Remove);
    };

    if let Err(failure) = validate(incoming, question) {
        let prompt = Prompt::for_question(question, session.cursor(), total);
        session.touch(now);
        return (OutboundAction::SendValidationError { failure, prompt }, SessionFate::Keep);
    }

    session.record_answer(incoming.trim(), now);

    match session.current_question() {
        Some(next) => {
            let prompt = Prompt::for_question(next, session.cursor(), total);
            (OutboundAction::SendNextPrompt(prompt), SessionFate::Keep)
        }
        None => {
            let completed = session.clone().into_completed(now);
            (OutboundAction::SendCompletionSummary(completed), SessionFate::Remove)
        }
    }
}
