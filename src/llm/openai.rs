//! OpenAI Responses API client
//!
//! SECURITY: the API key is only sent to the configured OpenAI endpoint.
//! It is never forwarded to the MCP server.

use super::{FunctionCall, InputItem, LlmError, ModelResponse, TokenUsage, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Official OpenAI API base
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Client for the OpenAI Responses API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_API_BASE.to_string(),
            model: model.to_string(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Send one request and decode the model output
    pub async fn respond(
        &self,
        api_key: &str,
        instructions: Option<&str>,
        input: &[InputItem],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let request = ResponsesApiRequest {
            model: &self.model,
            input,
            instructions,
            max_output_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools: tools
                .iter()
                .map(|t| ResponsesTool {
                    tool_type: "function",
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                })
                .collect(),
        };

        tracing::debug!(
            "Sending {} input items and {} tools to OpenAI Responses API (model {})",
            input.len(),
            tools.len(),
            self.model
        );

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI Responses API request failed ({}): {}", status, error_text);
            return Err(LlmError::from_http_status(status, error_text));
        }

        let body = response.text().await.map_err(LlmError::from_network_error)?;
        let parsed: ResponsesApiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(parsed.into_model_response())
    }
}

// ============================================================================
// Responses API wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ResponsesApiRequest<'a> {
    model: &'a str,
    input: &'a [InputItem],
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ResponsesTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// Responses API tools carry name/description/parameters at top level
#[derive(Debug, Serialize)]
struct ResponsesTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ResponsesApiResponse {
    #[serde(default)]
    output: Vec<ResponsesOutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponsesOutputItem {
    #[serde(rename = "type")]
    output_type: String,
    #[serde(default)]
    content: Vec<ResponsesContentItem>,
    #[serde(default)]
    call_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesContentItem {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u32,
    output_tokens: u32,
    total_tokens: u32,
}

impl ResponsesApiResponse {
    fn into_model_response(self) -> ModelResponse {
        let mut text_parts = Vec::new();
        let mut function_calls = Vec::new();

        for item in self.output {
            match item.output_type.as_str() {
                "message" => {
                    for part in item.content {
                        match part.content_type.as_str() {
                            "output_text" => {
                                if let Some(text) = part.text {
                                    text_parts.push(text);
                                }
                            }
                            other => tracing::debug!("Ignoring content type: {}", other),
                        }
                    }
                }
                "function_call" => {
                    let call_id = item.call_id.or(item.id).unwrap_or_default();
                    function_calls.push(FunctionCall {
                        call_id,
                        name: item.name.unwrap_or_else(|| "unknown".to_string()),
                        arguments: item.arguments.unwrap_or_default(),
                    });
                }
                // Reasoning summaries are not surfaced in the chat
                "reasoning" => {}
                other => tracing::warn!("Unknown output type: {}", other),
            }
        }

        ModelResponse {
            text: (!text_parts.is_empty()).then(|| text_parts.join("\n")),
            function_calls,
            usage: self.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}
