//! Gemini backend over the `generateContent` REST endpoint.
//!
//! This module uses Gemini API terminology:
//! - "contents" (array of role/parts turns, roles "user" and "model")
//! - "generationConfig" (camelCase sampling settings)
//!
//! The endpoint itself is stateless; conversation state lives client-side.
//! Each session keeps the turns it has seen, seeded from the transcript at
//! creation, and replays them on every call.

use async_trait::async_trait;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::inference::{
    BackendError, ChatBackend, ChatSession, GenerationConfig, Message, Role,
};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Gemini Wire Types
// ============================================================================

/// One turn in the request's `contents` array.
#[derive(Serialize, Debug, Clone)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

// ============================================================================
// Translation Layer
// ============================================================================

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Converts transcript messages into the `contents` seed, formatted as
/// alternating role/parts pairs.
fn seed_contents(history: &[Message]) -> Vec<Content> {
    history
        .iter()
        .map(|m| Content {
            role: wire_role(m.role),
            parts: vec![Part {
                text: m.text.clone(),
            }],
        })
        .collect()
}

/// Pulls the reply text out of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, BackendError> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| {
            BackendError::Parse("response contained no text candidates".to_string())
        })
}

// ============================================================================
// Backend Implementation
// ============================================================================

/// Gemini API backend.
pub struct GeminiBackend {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    /// Creates a new Gemini backend.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key; `None` makes every session attempt fail
    ///   with a config error instead of panicking at startup
    /// * `model` - model name, e.g. `gemini-1.5-flash`
    /// * `base_url` - optional custom base URL (defaults to the Gemini API)
    pub fn new(api_key: Option<String>, model: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn open_session(
        &self,
        history: &[Message],
        config: &GenerationConfig,
    ) -> Result<Box<dyn ChatSession>, BackendError> {
        // Re-checked on every open so a key supplied later is picked up.
        let api_key = self.api_key.clone().ok_or_else(|| {
            BackendError::Config("missing Gemini API key (set GEMINI_API_KEY)".to_string())
        })?;

        let contents = seed_contents(history);
        info!(
            "Gemini session opened: model={}, seed_turns={}",
            self.model,
            contents.len()
        );

        Ok(Box::new(GeminiSession {
            client: self.client.clone(),
            url: format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, self.model, api_key
            ),
            config: *config,
            contents,
        }))
    }
}

/// A live Gemini conversation. Accumulates turns across sends so the remote
/// model sees the whole exchange every time.
struct GeminiSession {
    client: reqwest::Client,
    url: String,
    config: GenerationConfig,
    contents: Vec<Content>,
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<String, BackendError> {
        self.contents.push(Content {
            role: "user",
            parts: vec![Part {
                text: text.to_string(),
            }],
        });

        let request = GenerateContentRequest {
            contents: &self.contents,
            generation_config: WireGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        debug!("Gemini request: {} turns", self.contents.len());

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Gemini API error: {} - {}", status.as_u16(), body);
            // Keep the raw body: quota errors embed the retryDelay hint there.
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        let reply = extract_text(parsed)?;

        self.contents.push(Content {
            role: "model",
            parts: vec![Part {
                text: reply.clone(),
            }],
        });
        info!("Gemini reply received: {} bytes", reply.len());
        Ok(reply)
    }
}
