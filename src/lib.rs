//! dbt-chat: chat with a dbt Cloud project through the dbt MCP server
//!
//! This library provides:
//! - MCP client for the remote dbt server over streamable HTTP
//! - Agent runtime that lets an OpenAI model call the dbt tools
//! - Session store with connection lifecycle and chat history
//! - Terminal front end driving it all from a blocking loop

pub mod agent;
pub mod bridge;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod prompts;
pub mod services;
pub mod session;
pub mod ui;

pub use config::Config;
pub use services::{ConnectionManager, ConversationOrchestrator};
pub use session::Session;
