use std::fmt;

use async_trait::async_trait;

use super::types::{GenerationConfig, Message};

/// Errors that can occur at the remote-service boundary.
/// Variants carry enough info to classify retryability at the call site.
#[derive(Debug)]
pub enum BackendError {
    /// Backend misconfigured (missing API key, bad URL). Not retryable.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// API returned an error response. The message keeps the raw body, which
    /// may embed a server-suggested retry delay.
    Api { status: u16, message: String },
    /// Failed to parse the backend's response. Not retryable.
    Parse(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Config(msg) => write!(f, "config error: {msg}"),
            BackendError::Network(msg) => write!(f, "network error: {msg}"),
            BackendError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            BackendError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Factory for remote conversation sessions.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &str;

    /// Opens a remote session seeded with `history`.
    ///
    /// The seed is read at call time: whatever the transcript holds when the
    /// session is constructed becomes the remote conversation context.
    async fn open_session(
        &self,
        history: &[Message],
        config: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, BackendError>;
}

/// A live remote conversation context. Accepts one message at a time and
/// returns the generated reply text.
#[async_trait]
pub trait ChatSession: Send {
    async fn send(&mut self, text: &str) -> Result<String, BackendError>;
}
