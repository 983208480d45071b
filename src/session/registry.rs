//! Process-wide session registry.
//!
//! Maps session ids to live sessions, enforces the concurrency policy, and
//! keeps a short terminal-state history so a second /stop_session can be
//! answered (and a reused id rejected) after the session itself is gone.
//! Registry operations hold the internal mutex only for map bookkeeping,
//! never across STT, LLM, or filesystem work.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::{EngineError, Result};
use crate::session::session::Session;
use crate::session::stats::{SessionStatus, StopOutcome};

/// Terminal outcomes retained after a session is destroyed.
const HISTORY_CAPACITY: usize = 32;

pub struct SessionRegistry {
    allow_concurrent: bool,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Arc<Session>>,
    history: VecDeque<(String, StopOutcome)>,
}

impl SessionRegistry {
    pub fn new(allow_concurrent: bool) -> Self {
        info!(
            concurrent_sessions = allow_concurrent,
            "session registry ready"
        );
        Self {
            allow_concurrent,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Fast policy check, run before any expensive backend construction.
    pub fn check_can_create(&self, session_id: &str) -> Result<()> {
        let inner = self.inner.lock();
        self.validate(&inner, session_id)
    }

    fn validate(&self, inner: &Inner, session_id: &str) -> Result<()> {
        if inner.sessions.contains_key(session_id) {
            return Err(EngineError::SessionAlreadyExists(session_id.to_string()));
        }
        if inner.history.iter().any(|(id, _)| id == session_id) {
            return Err(EngineError::SessionAlreadyExists(session_id.to_string()));
        }
        if !self.allow_concurrent {
            if let Some(active) = inner
                .sessions
                .values()
                .find(|s| !s.status().is_terminal())
            {
                return Err(EngineError::SessionAlreadyActive(
                    active.session_id().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Insert a fully constructed session and activate it. Policy is
    /// re-checked under the lock to close the construction race.
    pub fn insert(&self, session: Arc<Session>) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            self.validate(&inner, session.session_id())?;
            inner
                .sessions
                .insert(session.session_id().to_string(), Arc::clone(&session));
        }
        session.activate();
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    pub fn history_lookup(&self, session_id: &str) -> Option<StopOutcome> {
        self.inner
            .lock()
            .history
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, outcome)| outcome.clone())
    }

    /// Stop a session by id. Returns the outcome plus whether it was a
    /// replay of an already-terminal session.
    pub async fn stop_session(&self, session_id: &str) -> Result<(StopOutcome, bool)> {
        let session = match self.get(session_id) {
            Some(session) => session,
            None => {
                return match self.history_lookup(session_id) {
                    Some(outcome) => Ok((outcome, true)),
                    None => Err(EngineError::SessionNotFound(session_id.to_string())),
                }
            }
        };

        let result = session.stop().await;
        // Terminal either way (stop failure marks the session failed);
        // retire the record so the id answers from history from now on.
        if let Some(outcome) = session.outcome() {
            self.retire(session_id, outcome);
        }
        result
    }

    fn retire(&self, session_id: &str, outcome: StopOutcome) {
        let mut inner = self.inner.lock();
        inner.sessions.remove(session_id);
        inner.history.retain(|(id, _)| id != session_id);
        inner.history.push_back((session_id.to_string(), outcome));
        while inner.history.len() > HISTORY_CAPACITY {
            inner.history.pop_front();
        }
    }

    /// Shutdown path: abort every non-terminal session.
    pub fn abort_all(&self) {
        let sessions: Vec<Arc<Session>> = self.inner.lock().sessions.values().cloned().collect();
        for session in sessions {
            session.abort();
            if let Some(outcome) = session.outcome() {
                self.retire(session.session_id(), outcome);
            }
        }
    }

    /// Snapshot of every tracked session and its status, live map first,
    /// then retained history.
    pub fn list(&self) -> Vec<(String, SessionStatus)> {
        let inner = self.inner.lock();
        let mut out: Vec<(String, SessionStatus)> = inner
            .sessions
            .values()
            .map(|s| (s.session_id().to_string(), s.status()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out.extend(
            inner
                .history
                .iter()
                .map(|(id, outcome)| (id.clone(), outcome.session_status)),
        );
        out
    }

    /// Ids of live (non-terminal) sessions; used by shutdown logging.
    pub fn active_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|s| !s.status().is_terminal())
            .map(|s| s.session_id().to_string())
            .collect()
    }
}
