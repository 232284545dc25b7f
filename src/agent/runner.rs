//! Agent runner backed by the OpenAI Responses API

use super::{Agent, AgentError, AgentRuntime, RunResult};
use crate::llm::{InputItem, OpenAiClient, TokenUsage};
use crate::mcp::ToolService;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default number of model calls allowed in one turn
const DEFAULT_MAX_TURNS: usize = 10;

/// Default timeout for one MCP tool call (30 seconds)
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Runs agent turns: call the model, execute requested tools through the
/// MCP connection, feed the outputs back, until the model answers in text.
pub struct OpenAiRunner {
    client: OpenAiClient,
    max_turns: usize,
    tool_timeout: Duration,
}

impl OpenAiRunner {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            max_turns: DEFAULT_MAX_TURNS,
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Execute one tool call; failures become the output text the model sees.
    async fn execute_tool(&self, tools: &dyn ToolService, name: &str, arguments: &str) -> String {
        let args: Value = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(arguments) {
                Ok(v) => v,
                Err(e) => return format!("Invalid arguments for tool '{}': {}", name, e),
            }
        };

        tracing::debug!("Executing tool: {} with args: {}", name, args);

        match tokio::time::timeout(self.tool_timeout, tools.call_tool(name, args)).await {
            Ok(Ok(result)) => {
                if result.is_error {
                    tracing::debug!("Tool '{}' reported an error", name);
                }
                result.to_text()
            }
            Ok(Err(e)) => {
                tracing::warn!("Tool '{}' failed: {}", name, e);
                format!("An error occurred while running the tool '{}': {}", name, e)
            }
            Err(_) => format!(
                "Tool call '{}' on server '{}' timed out after {}s.",
                name,
                tools.name(),
                self.tool_timeout.as_secs()
            ),
        }
    }
}

#[async_trait]
impl AgentRuntime for OpenAiRunner {
    async fn run(
        &self,
        agent: &Agent,
        tools: Arc<dyn ToolService>,
        input: Vec<InputItem>,
        api_key: &str,
    ) -> Result<RunResult, AgentError> {
        let client = self.client.clone().with_model(&agent.model);
        let mut new_items: Vec<InputItem> = Vec::new();
        let mut usage = TokenUsage::default();

        for turn in 0..self.max_turns {
            let mut conversation = input.clone();
            conversation.extend(new_items.iter().cloned());

            let response = client
                .respond(
                    api_key,
                    Some(agent.instructions.as_str()),
                    &conversation,
                    &agent.tools,
                )
                .await?;

            if let Some(u) = &response.usage {
                usage.add(u);
            }

            if !response.has_function_calls() {
                let final_output = response.text.unwrap_or_default();
                new_items.push(InputItem::assistant(final_output.clone()));
                tracing::debug!(
                    "Agent '{}' finished after {} model call(s)",
                    agent.name,
                    turn + 1
                );
                return Ok(RunResult {
                    final_output,
                    input,
                    new_items,
                    usage,
                });
            }

            if let Some(text) = response.text.filter(|t| !t.is_empty()) {
                new_items.push(InputItem::assistant(text));
            }

            for call in response.function_calls {
                let output = self
                    .execute_tool(tools.as_ref(), &call.name, &call.arguments)
                    .await;
                new_items.push(InputItem::FunctionCall {
                    call_id: call.call_id.clone(),
                    name: call.name,
                    arguments: call.arguments,
                });
                new_items.push(InputItem::FunctionCallOutput {
                    call_id: call.call_id,
                    output,
                });
            }
        }

        Err(AgentError::MaxTurnsExceeded(self.max_turns))
    }
}
