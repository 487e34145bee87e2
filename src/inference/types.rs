use serde::{Deserialize, Serialize};

/// Who produced a message. Remote wire names differ per backend and are
/// translated there, not here.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Immutable once appended to a transcript.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

/// Ordered, append-only conversation history.
///
/// Order is turn order and is semantically meaningful, so there is no API
/// for removing, reordering, or deduplicating entries. Failed sends still
/// append a user entry followed by a synthesized assistant entry; the
/// transcript records the full interaction history including failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends a user turn and returns a reference to it.
    pub fn push_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(Role::User, text.into())
    }

    /// Appends an assistant turn and returns a reference to it.
    pub fn push_assistant(&mut self, text: impl Into<String>) -> &Message {
        self.push(Role::Assistant, text.into())
    }

    fn push(&mut self, role: Role, text: String) -> &Message {
        self.messages.push(Message { role, text });
        self.messages.last().expect("just pushed")
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Sampling settings sent with every session seed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1024,
        }
    }
}
