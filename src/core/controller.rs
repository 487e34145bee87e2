//! # Conversation Controller
//!
//! Owns the transcript, the remote session handle, and the request-pacing
//! state, and orchestrates `submit`:
//!
//! ```text
//! submit(text)
//!   ├── reject blank input (no state change)
//!   ├── append user message, clear pending input, loading = true
//!   ├── ensure_session()        // lazily seeds from the transcript
//!   ├── send_with_retry(text)   // gate → send → classify → backoff
//!   ├── append assistant reply, or a synthesized error entry
//!   └── loading = false         // on every exit path
//! ```
//!
//! `submit` takes `&mut self`, so overlapping submissions are serialized by
//! the borrow checker: the session handle, gate, and retry counter have a
//! single writer. The controller suspends only inside the gate and the
//! backoff sleeps; a host event loop stays responsive during both.
//!
//! Cancellation is not supported: once a send or retry sleep begins, it runs
//! to completion or terminal failure.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::inference::retry::{RetryPolicy, extract_retry_delay, is_rate_limit};
use crate::inference::throttle::RequestGate;
use crate::inference::{
    BackendError, ChatBackend, ChatSession, GenerationConfig, Message, Transcript,
};

/// User-facing text appended when retries are exhausted.
const RATE_LIMIT_NOTICE: &str =
    "Rate limit exceeded. Please wait a few minutes before sending another message.";
/// User-facing text appended for any other failure.
const GENERIC_NOTICE: &str = "Sorry, I encountered an error. Please try again.";

/// Terminal outcome of one dispatched submission.
///
/// Transient rate-limit failures never reach the orchestrator; they are
/// retried inside the send loop until they either succeed or collapse into
/// [`SendError::RateLimitExceeded`].
#[derive(Debug)]
pub enum SendError {
    /// Session could not be constructed (missing credential, bad config).
    Initialization(BackendError),
    /// The service kept rate-limiting us until retries ran out. The session
    /// itself is still assumed healthy.
    RateLimitExceeded { attempts: u32 },
    /// Any other send failure. The session is suspect.
    Transport(BackendError),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Initialization(e) => write!(f, "failed to initialize chat session: {e}"),
            SendError::RateLimitExceeded { attempts } => {
                write!(f, "rate limit exceeded after {attempts} retries")
            }
            SendError::Transport(e) => write!(f, "send failed: {e}"),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Initialization(e) | SendError::Transport(e) => Some(e),
            SendError::RateLimitExceeded { .. } => None,
        }
    }
}

/// Conversation state plus the orchestration around it. A presentation layer
/// renders the observable fields and calls [`submit`](Self::submit); nothing
/// else mutates conversation state.
pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    generation: GenerationConfig,
    transcript: Transcript,
    session: Option<Box<dyn ChatSession>>,
    gate: RequestGate,
    policy: RetryPolicy,
    /// Consecutive rate-limit failures. Reset on every successful send.
    retry_count: u32,
    /// Text the user is composing. Cleared when a submission is accepted.
    pub pending_input: String,
    is_loading: bool,
    /// Status line for the presentation layer.
    pub status_message: String,
    /// Transient notification; the host shows and clears it.
    pub error: Option<String>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            generation: GenerationConfig::default(),
            transcript: Transcript::new(),
            session: None,
            gate: RequestGate::default(),
            policy: RetryPolicy::default(),
            retry_count: 0,
            pending_input: String::new(),
            is_loading: false,
            status_message: String::from("Ready."),
            error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Eagerly opens the remote session at startup. Failure is non-fatal:
    /// the chat stays inert and the cause is surfaced as a notification.
    pub async fn init(&mut self) {
        if let Err(e) = self.ensure_session().await {
            warn!("Startup session initialization failed: {e}");
            self.error = Some(format!("Failed to initialize chat: {e}"));
        }
    }

    /// Relays one user message to the remote service.
    ///
    /// Every failure is converted into a transcript entry and a notification
    /// here; nothing escapes to the caller. The loading flag is cleared on
    /// all exit paths.
    pub async fn submit(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        self.transcript.push_user(text);
        self.pending_input.clear();
        self.is_loading = true;
        self.error = None;
        self.status_message = String::from("Waiting for reply...");

        match self.dispatch(text).await {
            Ok(reply) => {
                self.transcript.push_assistant(reply);
                self.status_message = String::from("Ready.");
            }
            Err(err) => {
                warn!("Submit failed: {err}");
                self.handle_failure(err).await;
            }
        }

        self.is_loading = false;
    }

    async fn dispatch(&mut self, text: &str) -> Result<String, SendError> {
        self.ensure_session().await.map_err(SendError::Initialization)?;
        self.send_with_retry(text).await
    }

    /// Converts a terminal failure into a transcript entry plus notification,
    /// and decides the session's fate: rate-limit exhaustion leaves it alone,
    /// anything else invalidates it and eagerly reopens so the next
    /// submission does not pay the seeding latency again.
    async fn handle_failure(&mut self, err: SendError) {
        match err {
            SendError::RateLimitExceeded { .. } => {
                self.transcript.push_assistant(RATE_LIMIT_NOTICE);
                self.error = Some(RATE_LIMIT_NOTICE.to_string());
                self.status_message = String::from("Rate limited.");
            }
            SendError::Initialization(_) | SendError::Transport(_) => {
                self.transcript.push_assistant(GENERIC_NOTICE);
                self.error = Some(String::from("Failed to get response. Please try again."));
                self.status_message = String::from("Ready.");
                self.invalidate_session();
                // Best-effort reconstruction; a failure here surfaces on the
                // next submit anyway.
                if let Err(e) = self.ensure_session().await {
                    warn!("Eager session reconstruction failed: {e}");
                }
            }
        }
    }

    /// Opens the remote session if none is cached, seeding it with the full
    /// transcript as it stands right now. On failure nothing is cached.
    async fn ensure_session(&mut self) -> Result<(), BackendError> {
        if self.session.is_none() {
            let session = self
                .backend
                .open_session(self.transcript.messages(), &self.generation)
                .await?;
            info!(
                "Session opened on {} with {} seed messages",
                self.backend.name(),
                self.transcript.len()
            );
            self.session = Some(session);
        }
        Ok(())
    }

    /// Drops the cached session, forcing full reconstruction on next use.
    fn invalidate_session(&mut self) {
        debug!("Session invalidated");
        self.session = None;
    }

    /// Bounded retry loop around one send. Every attempt passes the request
    /// gate first; rate-limit-class failures back off and retry with the
    /// same input and session, everything else propagates immediately.
    async fn send_with_retry(&mut self, text: &str) -> Result<String, SendError> {
        loop {
            self.gate.acquire().await;

            let session = self
                .session
                .as_mut()
                .expect("session exists after ensure_session");
            match session.send(text).await {
                Ok(reply) => {
                    self.retry_count = 0;
                    return Ok(reply);
                }
                Err(err) if is_rate_limit(&err) => {
                    if !self.policy.should_retry(self.retry_count) {
                        return Err(SendError::RateLimitExceeded {
                            attempts: self.retry_count,
                        });
                    }
                    self.retry_count += 1;
                    let delay = extract_retry_delay(&err.to_string())
                        .unwrap_or_else(|| self.policy.delay_for(self.retry_count));
                    warn!(
                        "Rate limit hit: retrying in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        self.retry_count,
                        self.policy.max_retries
                    );
                    self.status_message =
                        format!("Rate limit reached. Retrying in {} seconds...", delay.as_secs());
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(SendError::Transport(err)),
            }
        }
    }
}
