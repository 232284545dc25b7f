//! One conversational turn
//!
//! Sends the transcript plus the new prompt through the agent runtime,
//! recovers which tools ran from the run trace, and turns failures into
//! readable assistant text instead of propagating them.

use super::connection::error_chain;
use crate::agent::{AgentError, AgentRuntime};
use crate::llm::InputItem;
use crate::session::{ActiveConnection, ChatMessage, Session};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Output used when a tool call has no matching output record
pub const TOOL_EXECUTED_PLACEHOLDER: &str = "Tool executed";

/// Tool outputs longer than this many characters are truncated
pub const MAX_TOOL_OUTPUT_CHARS: usize = 1000;

pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Shown instead of the raw error when a tool response could not be processed
pub const SERIALIZATION_ADVISORY: &str = "⚠️ There was an issue processing the tool response. \
The data returned might be too complex or in an unexpected format. \
Please try rephrasing your question or requesting a simpler output.";

/// Shown when a prompt arrives without an API key
pub const MISSING_API_KEY_MESSAGE: &str =
    "❌ Missing OpenAI API key. Please provide your API key with /key.";

/// One tool invocation recovered from a run trace
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub tool_name: String,
    /// Decoded arguments; `{}` when the call carried none
    pub input: Value,
    pub output: String,
    pub call_id: Option<String>,
}

/// Result of one turn. Failures are carried as text, never raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Answer text or user-facing error text
    pub output: String,
    pub tool_executions: Vec<ToolExecution>,
    /// Raw error message when the turn failed
    pub error: Option<String>,
    /// Error with its sources, for diagnostics
    pub detail: Option<String>,
}

impl TurnOutcome {
    pub fn answer(output: impl Into<String>, tool_executions: Vec<ToolExecution>) -> Self {
        Self {
            output: output.into(),
            tool_executions,
            ..Default::default()
        }
    }

    pub fn failed(error: &AgentError) -> Self {
        let message = error.to_string();
        let output = if is_serialization_error(&message) {
            SERIALIZATION_ADVISORY.to_string()
        } else {
            format!("⚠️ An error occurred while processing your request: {}", message)
        };
        Self {
            output,
            tool_executions: Vec::new(),
            detail: Some(error_chain(error)),
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Answer text followed by the tools-used section, if any tools ran
    pub fn render(&self) -> String {
        format_response(&self.output, &self.tool_executions)
    }
}

/// Why a turn could not start
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("Not connected to the dbt MCP server. Use /connect first.")]
    NotConnected,

    #[error("{}", MISSING_API_KEY_MESSAGE)]
    MissingApiKey,
}

/// Runs turns against the session's agent
pub struct ConversationOrchestrator {
    runtime: Arc<dyn AgentRuntime>,
}

impl ConversationOrchestrator {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Run one turn for `user_message` against `transcript`, the messages
    /// that came before it.
    pub async fn run_turn(
        &self,
        connection: &ActiveConnection,
        transcript: &[ChatMessage],
        user_message: &str,
        api_key: &str,
    ) -> TurnOutcome {
        let input = build_input(transcript, user_message);
        tracing::debug!(
            "Running turn with {} prior message(s) and {} tool(s)",
            transcript.len(),
            connection.tools.len()
        );

        let result = self
            .runtime
            .run(&connection.agent, connection.service.clone(), input, api_key)
            .await;

        match result {
            Ok(run) => {
                let tool_executions = match run.to_input_list() {
                    Ok(items) => extract_tool_executions(&items),
                    Err(e) => {
                        tracing::warn!("Could not read tool executions from run trace: {}", e);
                        Vec::new()
                    }
                };
                TurnOutcome::answer(run.final_output, tool_executions)
            }
            Err(e) => {
                tracing::error!("Agent run failed: {}", e);
                TurnOutcome::failed(&e)
            }
        }
    }

    /// Append the prompt to the current chat, run the turn, and append the
    /// rendered answer.
    ///
    /// Without an API key the chat gets an error reply and no turn runs.
    pub fn send(&self, session: &mut Session, user_message: &str) -> Result<TurnOutcome, TurnError> {
        if !session.is_connected() {
            return Err(TurnError::NotConnected);
        }
        let Some(api_key) = session.model.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            session.chats.append(ChatMessage::user(user_message));
            session.chats.append(ChatMessage::assistant(MISSING_API_KEY_MESSAGE));
            return Err(TurnError::MissingApiKey);
        };

        let transcript = session.chats.current().messages().to_vec();
        session.chats.append(ChatMessage::user(user_message));

        let outcome = match session.connection() {
            Some(connection) => session.runtime().run(self.run_turn(
                connection,
                &transcript,
                user_message,
                &api_key,
            )),
            None => return Err(TurnError::NotConnected),
        };

        if let Some(detail) = &outcome.detail {
            session.record_error(detail.clone());
        }
        // Tools used are listed in the rendered content, not the annotation
        session.chats.append(ChatMessage::assistant(outcome.render()));
        Ok(outcome)
    }
}

/// Prior messages with content, then the new prompt
fn build_input(transcript: &[ChatMessage], user_message: &str) -> Vec<InputItem> {
    transcript
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| InputItem::Message {
            role: m.role,
            content: m.content.clone(),
        })
        .chain(std::iter::once(InputItem::user(user_message)))
        .collect()
}

/// Recover tool invocations from a run trace, in call order.
///
/// Calls are paired with outputs by call id; a call without an output keeps
/// the placeholder text. Malformed entries are skipped.
pub fn extract_tool_executions(items: &[Value]) -> Vec<ToolExecution> {
    let mut executions = Vec::new();
    let mut by_call_id: HashMap<String, usize> = HashMap::new();

    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("function_call") => {
                let call_id = obj
                    .get("call_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
                let tool_name = obj
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let input = decode_arguments(obj.get("arguments"));

                if let Some(id) = &call_id {
                    by_call_id.insert(id.clone(), executions.len());
                }
                executions.push(ToolExecution {
                    tool_name,
                    input,
                    output: TOOL_EXECUTED_PLACEHOLDER.to_string(),
                    call_id,
                });
            }
            Some("function_call_output") => {
                let Some(index) = obj
                    .get("call_id")
                    .and_then(Value::as_str)
                    .and_then(|id| by_call_id.get(id))
                else {
                    continue;
                };
                executions[*index].output = truncate_output(&output_text(obj.get("output")));
            }
            _ => {}
        }
    }

    executions
}

/// Blank or missing arguments become `{}`; text that is not JSON is kept as
/// a string
fn decode_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        None => Value::Object(Map::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
    }
}

fn output_text(output: Option<&Value>) -> String {
    match output {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
        }
        Some(v) => v.to_string(),
    }
}

/// Cut `output` to `MAX_TOOL_OUTPUT_CHARS` characters plus a marker
pub fn truncate_output(output: &str) -> String {
    if output.chars().count() > MAX_TOOL_OUTPUT_CHARS {
        let head: String = output.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
        format!("{}{}", head, TRUNCATION_MARKER)
    } else {
        output.to_string()
    }
}

/// Whether an error message points at a malformed tool response
pub fn is_serialization_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("serialization") || lower.contains("json")
}

/// Append a numbered "dbt Tools Used" section when tools ran
pub fn format_response(output: &str, executions: &[ToolExecution]) -> String {
    if executions.is_empty() {
        return output.to_string();
    }
    let mut text = format!("{}\n\n---\n**🛠️ dbt Tools Used:**\n\n", output);
    for (i, execution) in executions.iter().enumerate() {
        text.push_str(&format!("**{}**. {}\n", i + 1, execution.tool_name));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use serde_json::json;

    #[test]
    fn test_extract_pairs_calls_with_outputs() {
        let items = vec![
            json!({"type": "message", "role": "user", "content": "hi"}),
            json!({"type": "function_call", "call_id": "c1", "name": "list_metrics", "arguments": ""}),
            json!({"type": "function_call", "call_id": "c2", "name": "get_dimensions", "arguments": "{\"metrics\":[\"revenue\"]}"}),
            json!({"type": "function_call_output", "call_id": "c2", "output": "region, date"}),
            json!({"type": "function_call_output", "call_id": "c1", "output": "revenue"}),
        ];
        let executions = extract_tool_executions(&items);

        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].tool_name, "list_metrics");
        assert_eq!(executions[0].input, json!({}));
        assert_eq!(executions[0].output, "revenue");
        assert_eq!(executions[1].input, json!({"metrics": ["revenue"]}));
        assert_eq!(executions[1].output, "region, date");
        assert_eq!(executions[1].call_id.as_deref(), Some("c2"));
    }

    #[test]
    fn test_extract_unmatched_call_keeps_placeholder() {
        let items = vec![
            json!({"type": "function_call", "call_id": "c1", "name": "list_metrics", "arguments": "{}"}),
            json!({"type": "function_call_output", "call_id": "other", "output": "x"}),
        ];
        let executions = extract_tool_executions(&items);
        assert_eq!(executions[0].output, TOOL_EXECUTED_PLACEHOLDER);
    }

    #[test]
    fn test_extract_skips_malformed_entries() {
        let items = vec![
            json!("not an object"),
            json!({"type": "function_call", "name": "no_id", "arguments": "{not json"}),
            json!({"type": "function_call_output", "output": "orphan"}),
            json!({"type": "function_call", "call_id": "c9", "arguments": {"limit": 5}}),
        ];
        let executions = extract_tool_executions(&items);
        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].tool_name, "no_id");
        assert_eq!(executions[0].input, json!("{not json"));
        assert_eq!(executions[0].call_id, None);
        assert_eq!(executions[0].output, TOOL_EXECUTED_PLACEHOLDER);
        assert_eq!(executions[1].tool_name, "unknown");
        assert_eq!(executions[1].input, json!({"limit": 5}));
    }

    #[test]
    fn test_structured_output_is_pretty_printed() {
        let items = vec![
            json!({"type": "function_call", "call_id": "c1", "name": "query", "arguments": "{}"}),
            json!({"type": "function_call_output", "call_id": "c1", "output": {"rows": 3}}),
        ];
        let executions = extract_tool_executions(&items);
        assert_eq!(executions[0].output, "{\n  \"rows\": 3\n}");
    }

    #[test]
    fn test_truncate_output() {
        let long = "a".repeat(1500);
        let truncated = truncate_output(&long);
        assert_eq!(truncated.chars().count(), MAX_TOOL_OUTPUT_CHARS + TRUNCATION_MARKER.len());
        assert!(truncated.ends_with(TRUNCATION_MARKER));

        let exact = "b".repeat(MAX_TOOL_OUTPUT_CHARS);
        assert_eq!(truncate_output(&exact), exact);
    }

    #[test]
    fn test_serialization_error_detection() {
        assert!(is_serialization_error("Invalid JSON in response"));
        assert!(is_serialization_error("Serialization failed"));
        assert!(!is_serialization_error("rate limited"));
    }

    #[test]
    fn test_failed_outcome_messages() {
        let json_err = AgentError::Model(LlmError::InvalidResponse("expected value".into()));
        let outcome = TurnOutcome::failed(&json_err);
        assert_eq!(outcome.output, SERIALIZATION_ADVISORY);
        assert!(outcome.error.as_deref().unwrap().contains("JSON"));
        assert!(outcome.is_error());

        let other = AgentError::MaxTurnsExceeded(10);
        let outcome = TurnOutcome::failed(&other);
        assert_eq!(
            outcome.output,
            "⚠️ An error occurred while processing your request: Max turns (10) exceeded"
        );
    }

    #[test]
    fn test_format_response() {
        assert_eq!(format_response("answer", &[]), "answer");

        let executions = vec![
            ToolExecution {
                tool_name: "list_metrics".into(),
                input: json!({}),
                output: "ok".into(),
                call_id: None,
            },
            ToolExecution {
                tool_name: "query_metrics".into(),
                input: json!({}),
                output: "ok".into(),
                call_id: None,
            },
        ];
        assert_eq!(
            format_response("answer", &executions),
            "answer\n\n---\n**🛠️ dbt Tools Used:**\n\n**1**. list_metrics\n**2**. query_metrics\n"
        );
    }

    #[test]
    fn test_build_input_appends_prompt() {
        let transcript = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant(""),
            ChatMessage::assistant("reply"),
        ];
        let input = build_input(&transcript, "second");
        assert_eq!(input.len(), 3);
        assert_eq!(input[2], InputItem::user("second"));
    }
}
