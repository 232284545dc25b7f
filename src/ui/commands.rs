//! Slash commands accepted by the chat prompt

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Connect,
    Disconnect,
    /// List the catalog, or show one tool
    Tools(Option<String>),
    Key(String),
    Provider(Option<String>),
    Host(String),
    Token(String),
    Env(String),
    New,
    Chats,
    /// Listing number or chat id
    Select(String),
    /// Listing number or chat id; the current chat when absent
    Delete(Option<String>),
    Trace,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0}. Type /help for the list of commands.")]
    Unknown(String),

    #[error("Usage: /{command} <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

/// Help rows: usage and description
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("/connect", "Connect to the dbt MCP server"),
    ("/disconnect", "Close the MCP connection"),
    ("/status", "Show connection and model settings"),
    ("/tools [name]", "List available dbt tools, or show one tool's parameters"),
    ("/key <api-key>", "Set the OpenAI API key"),
    ("/provider [name]", "Show or switch the model provider"),
    ("/host <host>", "Set the dbt Cloud host"),
    ("/token <token>", "Set the dbt Cloud service token"),
    ("/env <id>", "Set the dbt production environment id"),
    ("/new", "Start a new chat"),
    ("/chats", "List recent chats"),
    ("/select <n|id>", "Switch to a chat from /chats"),
    ("/delete [n|id]", "Delete a chat (default: the current one)"),
    ("/trace", "Show details of the last error"),
    ("/help", "Show this help"),
    ("/quit", "Exit"),
];

impl Command {
    /// Parse a line starting with `/`
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim().trim_start_matches('/');
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match name.to_lowercase().as_str() {
            "help" | "h" | "?" => Ok(Command::Help),
            "status" => Ok(Command::Status),
            "connect" => Ok(Command::Connect),
            "disconnect" => Ok(Command::Disconnect),
            "tools" => Ok(Command::Tools(arg)),
            "key" => required(arg, "key", "api-key").map(Command::Key),
            "provider" => Ok(Command::Provider(arg)),
            "host" => required(arg, "host", "host").map(Command::Host),
            "token" => required(arg, "token", "token").map(Command::Token),
            "env" => required(arg, "env", "id").map(Command::Env),
            "new" => Ok(Command::New),
            "chats" | "history" => Ok(Command::Chats),
            "select" => required(arg, "select", "n|id").map(Command::Select),
            "delete" => Ok(Command::Delete(arg)),
            "trace" => Ok(Command::Trace),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(
    arg: Option<String>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CommandError> {
    arg.ok_or(CommandError::MissingArgument { command, argument })
}
