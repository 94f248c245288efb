//! LLM Client: the only module that talks to the Anthropic Messages API.
//!
//! Section generators depend on the `GenerationBackend` trait, never on
//! `LlmClient` directly, so tests can swap in scripted backends. Retries here
//! are transport-level only (429 and 5xx). Section-level retries and timeouts
//! belong to the controller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Hardcoded so every section is written by the same model.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_SENDS: u32 = 3;
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One text-completion request. The section generator owns the wording;
/// `max_tokens` is the only output constraint passed through to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// The external text-generation capability: `complete(prompt, constraints) → text`.
///
/// No ordering or idempotence guarantee. Implementations may be slow or fail
/// transiently; callers bound every call with a timeout.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ReplyBlock>,
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesReply {
    /// First text block; tool-use and other block kinds are skipped.
    fn into_text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 1s before the second send, 2s before the third.
fn backoff(send: u32) -> Duration {
    Duration::from_millis(1000 << send.saturating_sub(1))
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            http: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            api_key,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<MessagesReply, LlmError> {
        let body = MessagesBody {
            model: MODEL,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: [UserTurn {
                role: "user",
                content: &request.prompt,
            }],
        };

        let mut last_error = None;

        for send in 0..MAX_SENDS {
            if send > 0 {
                let delay = backoff(send);
                warn!("Retrying LLM call in {}ms (send {}/{MAX_SENDS})", delay.as_millis(), send + 1);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .http
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let reply: MessagesReply = response.json().await?;
                debug!(
                    "LLM call ok: {} input / {} output tokens",
                    reply.usage.input_tokens, reply.usage.output_tokens
                );
                return Ok(reply);
            }

            let raw = response.text().await.unwrap_or_default();
            if is_retryable(status) {
                warn!("LLM API returned {status}: {raw}");
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: raw,
                });
                continue;
            }

            let message = serde_json::from_str::<ErrorReply>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_SENDS - 1,
        }))
    }
}

#[async_trait]
impl GenerationBackend for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.send(request)
            .await?
            .into_text()
            .ok_or(LlmError::EmptyContent)
    }
}

/// Strips a ```json ... ``` or bare ``` ... ``` fence around a reply.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}
