//! crates/survey_core/src/store.rs
//!
//! The survey session store: at most one in-progress survey per end user.
//!
//! Sessions are volatile. They disappear when a survey completes, when they are
//! removed explicitly, or when an idle sweep is asked to drop them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Question, SurveySession};
use crate::error::SurveyError;

/// What to do with a session after a step has run against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFate {
    Keep,
    Remove,
}

/// Storage contract for in-progress sessions.
///
/// Implementations must make `insert_new` an atomic check-and-insert and must
/// run `with_session` steps without interleaving other writes to the same owner.
pub trait SessionStore: Send + Sync {
    /// Inserts `session` unless its owner already has one.
    fn insert_new(&self, session: SurveySession) -> Result<(), SurveyError>;

    /// Returns a snapshot of the owner's session.
    fn get(&self, owner_id: &str) -> Option<SurveySession>;

    /// Removes and returns the owner's session. A no-op when absent.
    fn remove(&self, owner_id: &str) -> Option<SurveySession>;

    /// Runs `step` against the live session, then keeps or drops it.
    /// Returns `false` when the owner has no session.
    fn with_session(
        &self,
        owner_id: &str,
        step: &mut dyn FnMut(&mut SurveySession) -> SessionFate,
    ) -> bool;

    /// Drops every session whose last activity is older than `cutoff` and
    /// returns the affected owners.
    fn remove_idle(&self, cutoff: DateTime<Utc>) -> Vec<String>;

    /// Number of active sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a fresh session (cursor 0, no answers) for `owner_id`.
    fn create(&self, owner_id: &str, questions: Vec<Question>) -> Result<(), SurveyError> {
        self.insert_new(SurveySession::new(owner_id, questions, None))
    }
}

//=========================================================================================
// In-Memory Implementation
//=========================================================================================

/// A process-local store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SurveySession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SurveySession>> {
        // Steps are plain in-memory computations, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert_new(&self, session: SurveySession) -> Result<(), SurveyError> {
        let mut sessions = self.lock();
        if sessions.contains_key(session.owner_id()) {
            return Err(SurveyError::AlreadyActive {
                owner_id: session.owner_id().to_string(),
            });
        }
        sessions.insert(session.owner_id().to_string(), session);
        Ok(())
    }

    fn get(&self, owner_id: &str) -> Option<SurveySession> {
        self.lock().get(owner_id).cloned()
    }

    fn remove(&self, owner_id: &str) -> Option<SurveySession> {
        self.lock().remove(owner_id)
    }

    fn with_session(
        &self,
        owner_id: &str,
        step: &mut dyn FnMut(&mut SurveySession) -> SessionFate,
    ) -> bool {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(owner_id) else {
            return false;
        };
        if step(session) == SessionFate::Remove {
            sessions.remove(owner_id);
        }
        true
    }

    fn remove_idle(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.lock();
        let idle: Vec<String> = sessions
            .values()
            .filter(|session| session.last_activity_at() < cutoff)
            .map(|session| session.owner_id().to_string())
            .collect();
        for owner_id in &idle {
            sessions.remove(owner_id);
        }
        idle
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
