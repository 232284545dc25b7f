//! Agent runtime: runs one conversational turn against the model, executing
//! the dbt tools it asks for along the way.

mod runner;

pub use runner::OpenAiRunner;

use crate::llm::{InputItem, LlmError, TokenUsage, ToolDefinition};
use crate::mcp::{McpToolDef, ToolService};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Default agent name
pub const DEFAULT_AGENT_NAME: &str = "Assistant";

/// Default agent instructions
pub const DEFAULT_INSTRUCTIONS: &str = "Use the tools to answer the user's questions";

/// An agent bound to one tool catalog
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub model: String,
    /// Tools offered to the model, fixed when the agent is built
    pub tools: Vec<ToolDefinition>,
}

impl Agent {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            tools: Vec::new(),
        }
    }

    /// Offer the given MCP catalog to the model
    pub fn with_catalog(mut self, catalog: &[McpToolDef]) -> Self {
        self.tools = catalog.iter().map(tool_definition).collect();
        self
    }
}

/// Convert an MCP tool into a model tool definition.
///
/// Tools without a schema get an empty object schema, which the model API
/// requires.
fn tool_definition(tool: &McpToolDef) -> ToolDefinition {
    let parameters = match &tool.input_schema {
        Some(schema) if schema.is_object() => schema.clone(),
        _ => json!({"type": "object", "properties": {}}),
    };
    ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters,
    }
}

/// Errors from one agent run
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call failed
    #[error(transparent)]
    Model(#[from] LlmError),

    /// The model kept requesting tools past the turn limit
    #[error("Max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),
}

/// Outcome of one agent run
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Final text answer
    pub final_output: String,
    /// Conversation the run started from
    pub input: Vec<InputItem>,
    /// Items produced during the run (tool calls, tool outputs, answer)
    pub new_items: Vec<InputItem>,
    pub usage: TokenUsage,
}

impl RunResult {
    /// Full trace (input followed by generated items) as JSON objects,
    /// suitable as the next run's input.
    pub fn to_input_list(&self) -> Result<Vec<Value>, serde_json::Error> {
        self.input
            .iter()
            .chain(self.new_items.iter())
            .map(serde_json::to_value)
            .collect()
    }
}

/// Executes one turn for an agent
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(
        &self,
        agent: &Agent,
        tools: Arc<dyn ToolService>,
        input: Vec<InputItem>,
        api_key: &str,
    ) -> Result<RunResult, AgentError>;
}
