//! Interactive terminal front end
//!
//! A synchronous read-eval-print loop. Lines starting with `/` are commands;
//! anything else is a prompt for the agent, accepted only once the session is
//! connected and has an API key. All async work goes through the session's
//! runtime, so the loop itself never awaits.

mod commands;
mod render;

pub use commands::{Command, CommandError, COMMAND_HELP};
pub use render::{
    render_banner, render_chat_list, render_help, render_message, render_status,
    render_tool_catalog, render_tool_details,
};

use crate::services::{ConnectError, ConnectionManager, ConversationOrchestrator, TurnError};
use crate::session::{ChatError, Session};
use anyhow::Result;
use colored::Colorize;
use std::io::{BufRead, Write};

/// Shown when a prompt arrives before the session can run turns
pub const NOT_READY_HINT: &str =
    "Connect with /connect and set your OpenAI API key with /key to start chatting.";

/// Whether the loop keeps going after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<W: Write> {
    session: Session,
    connections: ConnectionManager,
    conversation: ConversationOrchestrator,
    out: W,
}

impl<W: Write> App<W> {
    pub fn new(
        session: Session,
        connections: ConnectionManager,
        conversation: ConversationOrchestrator,
        out: W,
    ) -> Self {
        Self {
            session,
            connections,
            conversation,
            out,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Tear down, returning the output sink
    pub fn finish(self) -> W {
        let Self { session, out, .. } = self;
        session.shutdown();
        out
    }

    /// Read lines until end of input or `/quit`
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        write!(self.out, "{}", render_banner())?;
        if !self.session.is_ready() {
            writeln!(self.out, "{}\n", NOT_READY_HINT.dimmed())?;
        }

        let mut lines = input.lines();
        loop {
            let marker = self.prompt_marker();
            write!(self.out, "{} ", marker)?;
            self.out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(self.out)?;
                break;
            };
            if self.handle_line(&line?)? == Flow::Quit {
                break;
            }
        }

        writeln!(self.out, "Goodbye!")?;
        Ok(())
    }

    fn prompt_marker(&self) -> colored::ColoredString {
        if self.session.is_ready() {
            ">".green().bold()
        } else {
            ">".dimmed()
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        if line.starts_with('/') {
            return match Command::parse(line) {
                Ok(command) => self.handle_command(command),
                Err(e) => {
                    writeln!(self.out, "{}", e.to_string().yellow())?;
                    Ok(Flow::Continue)
                }
            };
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
            return Ok(Flow::Quit);
        }
        self.handle_prompt(line)?;
        Ok(Flow::Continue)
    }

    fn handle_prompt(&mut self, prompt: &str) -> Result<()> {
        if !self.session.is_ready() {
            writeln!(self.out, "{}", NOT_READY_HINT.yellow())?;
            return Ok(());
        }

        writeln!(self.out, "{}", "Thinking...".dimmed())?;
        match self.conversation.send(&mut self.session, prompt) {
            Ok(_) => {
                if let Some(reply) = self.session.chats.current().messages().last() {
                    writeln!(self.out, "\n{}", render_message(reply))?;
                }
            }
            Err(TurnError::MissingApiKey) => {
                writeln!(self.out, "{}", TurnError::MissingApiKey.to_string().red())?;
            }
            Err(e) => writeln!(self.out, "{}", e.to_string().yellow())?,
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Help => write!(self.out, "{}", render_help())?,
            Command::Status => write!(self.out, "{}", render_status(&self.session))?,
            Command::Connect => self.connect()?,
            Command::Disconnect => {
                if self.session.is_connected() {
                    self.connections.disconnect(&mut self.session);
                    writeln!(self.out, "Disconnected from dbt MCP server.")?;
                } else {
                    writeln!(self.out, "Not connected.")?;
                }
            }
            Command::Tools(None) => {
                write!(self.out, "{}", render_tool_catalog(self.session.tools()))?
            }
            Command::Tools(Some(name)) => {
                match self.session.tools().iter().find(|t| t.name == name) {
                    Some(tool) => write!(self.out, "{}", render_tool_details(tool))?,
                    None => writeln!(self.out, "{}", format!("Tool not found: {}", name).yellow())?,
                }
            }
            Command::Key(key) => {
                self.session.model.api_key = Some(key);
                writeln!(self.out, "{}", "✅ OpenAI API key set.".green())?;
            }
            Command::Provider(None) => writeln!(
                self.out,
                "Provider: {} (model {})",
                self.session.model.provider, self.session.model.model
            )?,
            Command::Provider(Some(name)) => match self.session.model.set_provider(&name) {
                Some(model) => {
                    let model = model.to_string();
                    writeln!(self.out, "Provider set to {} (model {}).", self.session.model.provider, model)?;
                    if self.session.is_connected() {
                        writeln!(self.out, "{}", "Reconnect with /connect to use the new model.".dimmed())?;
                    }
                }
                None => {
                    let known: Vec<&str> = crate::llm::MODEL_OPTIONS.iter().map(|(p, _)| *p).collect();
                    writeln!(
                        self.out,
                        "{}",
                        format!("Unknown provider: {}. Available: {}", name, known.join(", ")).yellow()
                    )?;
                }
            },
            Command::Host(host) => {
                self.session.credentials.set_host(&host);
                let message = format!("dbt host set to {}", self.session.credentials.host);
                self.credentials_changed(&message)?;
            }
            Command::Token(token) => {
                self.session.credentials.token = Some(token);
                self.credentials_changed("dbt token set")?;
            }
            Command::Env(id) => {
                self.session.credentials.prod_env_id = Some(id);
                self.credentials_changed("Environment id set")?;
            }
            Command::New => {
                self.session.chats.create();
                writeln!(self.out, "Started a new chat.")?;
            }
            Command::Chats => write!(self.out, "{}", render_chat_list(&self.session.chats))?,
            Command::Select(target) => {
                let selected = self
                    .resolve_chat(&target)
                    .ok_or(ChatError::NotFound(target))
                    .and_then(|id| self.session.chats.select(&id));
                match selected {
                    Ok(()) => {
                        let chat = self.session.chats.current();
                        writeln!(self.out, "Switched to {}", chat.name.bold())?;
                        for message in chat.messages() {
                            writeln!(self.out, "{}", render_message(message))?;
                        }
                    }
                    Err(e) => writeln!(self.out, "{}", e.to_string().yellow())?,
                }
            }
            Command::Delete(target) => {
                let id = match target {
                    Some(target) => self.resolve_chat(&target),
                    None => Some(self.session.chats.current_id().to_string()),
                };
                match id.map(|id| self.session.chats.delete(&id)) {
                    Some(Ok(chat)) => writeln!(self.out, "Deleted chat: {}", chat.name)?,
                    Some(Err(e)) => writeln!(self.out, "{}", e.to_string().yellow())?,
                    None => writeln!(self.out, "{}", "Chat not found.".yellow())?,
                }
            }
            Command::Trace => match self.session.last_error() {
                Some(detail) => writeln!(self.out, "{}\n{}", "Last error:".bold(), detail)?,
                None => writeln!(self.out, "No errors recorded.")?,
            },
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn connect(&mut self) -> Result<()> {
        writeln!(self.out, "{}", "Connecting to dbt MCP server...".dimmed())?;
        match self.connections.connect(&mut self.session) {
            Ok(count) => writeln!(
                self.out,
                "{}",
                format!("✅ Connected to dbt MCP server. {} tools available.", count).green()
            )?,
            Err(e @ ConnectError::Configuration(_)) => {
                writeln!(self.out, "{}", format!("❌ Configuration Error: {}", e).red())?
            }
            Err(e) => writeln!(
                self.out,
                "{}",
                format!("❌ Failed to connect to dbt MCP server: {}", e).red()
            )?,
        }
        Ok(())
    }

    fn credentials_changed(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{}.", message)?;
        if self.session.is_connected() {
            writeln!(self.out, "{}", "Reconnect with /connect to apply.".dimmed())?;
        }
        Ok(())
    }

    /// Map a listing number from `/chats` or a chat id to a chat id
    fn resolve_chat(&self, target: &str) -> Option<String> {
        if let Ok(n) = target.parse::<usize>() {
            return self
                .session
                .chats
                .recent()
                .get(n.checked_sub(1)?)
                .map(|chat| chat.id.clone());
        }
        self.session.chats.get(target).map(|chat| chat.id.clone())
    }
}
