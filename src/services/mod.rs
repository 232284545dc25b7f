//! Service layer for dbt-chat
//!
//! Services sit between the presentation layer and the session, handling the
//! connection lifecycle and conversational turns.

pub mod connection;
pub mod conversation;

pub use connection::{error_chain, ConnectError, ConnectionManager};
pub use conversation::{
    extract_tool_executions, format_response, is_serialization_error, truncate_output,
    ConversationOrchestrator, ToolExecution, TurnError, TurnOutcome,
};
