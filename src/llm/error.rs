//! Failures of one OpenAI Responses API call
//!
//! The conversation layer only sees these through `AgentError::Model` and
//! decides from the rendered message whether the user gets the
//! serialization advisory: `InvalidResponse` mentions JSON and always does,
//! the rest fall through to the generic error reply.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// No key was entered with `/key` or `OPENAI_API_KEY`; nothing was sent
    #[error("OpenAI API key is missing")]
    MissingApiKey,

    /// The key was rejected (HTTP 401)
    #[error("OpenAI rejected the API key: {0}")]
    Unauthorized(String),

    #[error("OpenAI rate limit reached: {0}")]
    RateLimited(String),

    /// Any other 4xx, typically a tool schema derived from the dbt catalog
    /// that the Responses API refuses
    #[error("OpenAI rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx from the Responses API
    #[error("OpenAI service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Could not reach OpenAI: {0}")]
    Network(String),

    /// Body was not a Responses API payload
    #[error("Invalid JSON in OpenAI response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Classify a non-success status from `/responses`
    pub fn from_http_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 => LlmError::Unauthorized(message),
            429 => LlmError::RateLimited(message),
            code @ 500..=599 => LlmError::Service { status: code, message },
            code => LlmError::Rejected { status: code, message },
        }
    }

    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else if e.is_timeout() {
            LlmError::Network(format!("request timed out: {}", e))
        } else {
            LlmError::Network(e.to_string())
        }
    }
}
