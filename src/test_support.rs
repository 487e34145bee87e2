//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::controller::ConversationController;
use crate::inference::{
    BackendError, ChatBackend, ChatSession, GenerationConfig, Message,
};

/// One canned outcome for a scripted send.
pub enum ScriptedReply {
    Ok(&'static str),
    Err(BackendError),
}

/// Builds a 429 error carrying the given body text.
pub fn rate_limited(body: &str) -> BackendError {
    BackendError::Api {
        status: 429,
        message: body.to_string(),
    }
}

/// Backend whose sessions replay a queue of canned outcomes, recording how
/// often sessions are opened and what they were seeded with.
pub struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    opened: AtomicUsize,
    seeds: Mutex<Vec<Vec<Message>>>,
    fail_opens: bool,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            opened: AtomicUsize::new(0),
            seeds: Mutex::new(Vec::new()),
            fail_opens: false,
        }
    }

    /// A backend whose `open_session` always fails, as with a missing
    /// credential.
    pub fn failing() -> Self {
        Self {
            fail_opens: true,
            ..Self::new(Vec::new())
        }
    }

    /// How many times `open_session` was called (attempts, not successes).
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The seed history passed to each successful `open_session` call.
    pub fn seeds(&self) -> Vec<Vec<Message>> {
        self.seeds.lock().expect("seeds lock").clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_session(
        &self,
        history: &[Message],
        _config: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, BackendError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_opens {
            return Err(BackendError::Config("missing API key".to_string()));
        }
        self.seeds.lock().expect("seeds lock").push(history.to_vec());
        Ok(Box::new(ScriptedSession {
            replies: self.replies.clone(),
        }))
    }
}

struct ScriptedSession {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, _text: &str) -> Result<String, BackendError> {
        match self.replies.lock().expect("replies lock").pop_front() {
            Some(ScriptedReply::Ok(text)) => Ok(text.to_string()),
            Some(ScriptedReply::Err(err)) => Err(err),
            None => panic!("scripted backend ran out of replies"),
        }
    }
}

/// Creates a controller over a scripted backend, returning both so tests can
/// assert on the backend's recordings.
pub fn test_controller(
    replies: Vec<ScriptedReply>,
) -> (Arc<ScriptedBackend>, ConversationController) {
    let backend = Arc::new(ScriptedBackend::new(replies));
    let controller = ConversationController::new(backend.clone());
    (backend, controller)
}
