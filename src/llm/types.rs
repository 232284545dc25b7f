//! Shared types for the model API

use serde::{Deserialize, Serialize};

/// Role of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One item of a Responses API conversation.
///
/// The same shape is used for the request `input` and for the trace a run
/// hands back, so a finished run can be replayed as the next input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// Plain conversation message
    Message { role: Role, content: String },
    /// Tool invocation requested by the model
    FunctionCall {
        call_id: String,
        name: String,
        /// JSON-encoded arguments, exactly as the model produced them
        arguments: String,
    },
    /// Result of a tool invocation, correlated by `call_id`
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn user(content: impl Into<String>) -> Self {
        InputItem::Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        InputItem::Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Definition of a tool for the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One model response
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Concatenated output text, if the model produced any
    pub text: Option<String>,
    /// Function calls in output order
    pub function_calls: Vec<FunctionCall>,
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}
