//! Text rendering for the terminal front end.
//!
//! Everything here returns a `String` so the REPL decides where it goes.

use super::commands::COMMAND_HELP;
use crate::llm::Role;
use crate::mcp::McpToolDef;
use crate::session::{ChatHistory, ChatMessage, Session};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

const DESCRIPTION_WIDTH: usize = 80;

pub fn render_banner() -> String {
    format!(
        "{}\n{}\n",
        "=== dbt MCP Chat ===".bold().cyan(),
        "Ask questions about your dbt project. Type /help for commands.".dimmed()
    )
}

pub fn render_help() -> String {
    #[derive(Tabled)]
    struct HelpRow {
        #[tabled(rename = "Command")]
        command: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let rows: Vec<HelpRow> = COMMAND_HELP
        .iter()
        .map(|(command, description)| HelpRow {
            command: command.to_string(),
            description: description.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{}\n", table)
}

/// Connection and model settings
pub fn render_status(session: &Session) -> String {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "Setting")]
        setting: String,
        #[tabled(rename = "Value")]
        value: String,
    }

    let status = session.status();
    let set_or_missing = |present: bool| if present { "set" } else { "missing" }.to_string();
    let credentials = &session.credentials;

    let rows = vec![
        StatusRow {
            setting: "MCP connection".to_string(),
            value: format!("{} {}", status.icon(), status.display()),
        },
        StatusRow {
            setting: "MCP endpoint".to_string(),
            value: credentials.mcp_url(),
        },
        StatusRow {
            setting: "dbt host".to_string(),
            value: credentials.host.clone(),
        },
        StatusRow {
            setting: "dbt token".to_string(),
            value: set_or_missing(credentials.token.is_some()),
        },
        StatusRow {
            setting: "Environment id".to_string(),
            value: credentials
                .prod_env_id
                .clone()
                .unwrap_or_else(|| "missing".to_string()),
        },
        StatusRow {
            setting: "Provider".to_string(),
            value: session.model.provider.clone(),
        },
        StatusRow {
            setting: "Model".to_string(),
            value: session.model.model.clone(),
        },
        StatusRow {
            setting: "API key".to_string(),
            value: set_or_missing(session.model.has_api_key()),
        },
        StatusRow {
            setting: "Tools".to_string(),
            value: session.tools().len().to_string(),
        },
        StatusRow {
            setting: "Chat".to_string(),
            value: session.chats.current().name.clone(),
        },
    ];

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{}\n", table)
}

pub fn render_tool_catalog(tools: &[McpToolDef]) -> String {
    #[derive(Tabled)]
    struct ToolRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Tool")]
        name: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    if tools.is_empty() {
        return format!(
            "{}\n",
            "No tools available. Use /connect to load the dbt tool catalog.".yellow()
        );
    }

    let rows: Vec<ToolRow> = tools
        .iter()
        .enumerate()
        .map(|(i, tool)| ToolRow {
            index: i + 1,
            name: tool.name.clone(),
            description: summarize(&tool.description),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!(
        "{}\n{}\n",
        format!("🛠️ Available dbt Tools ({})", tools.len()).bold(),
        table
    )
}

pub fn render_tool_details(tool: &McpToolDef) -> String {
    let mut out = format!("{}\n", tool.name.bold().green());
    if !tool.description.is_empty() {
        out.push_str(&format!("{}\n", tool.description));
    }
    let parameters = tool.parameters();
    if parameters.is_empty() {
        out.push_str(&format!("{}\n", "No parameters".dimmed()));
    } else {
        out.push_str(&format!("{}\n", "Parameters:".bold()));
        for parameter in parameters {
            out.push_str(&format!("  • {}\n", parameter));
        }
    }
    out
}

pub fn render_message(message: &ChatMessage) -> String {
    let label = match message.role {
        Role::User => "You".bold().blue(),
        Role::Assistant => "Assistant".bold().green(),
        Role::System => "System".bold().yellow(),
    };
    let mut out = format!(
        "{} {}\n",
        label,
        message.timestamp.format("%H:%M:%S").to_string().dimmed()
    );
    if let Some(tool) = &message.tool {
        out.push_str(&format!("{}\n", format!("🛠️ {}", tool).dimmed()));
    }
    out.push_str(&message.content);
    out.push('\n');
    out
}

/// Recent chats, most recent first, numbered for `/select`
pub fn render_chat_list(history: &ChatHistory) -> String {
    #[derive(Tabled)]
    struct ChatRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "")]
        current: String,
        #[tabled(rename = "Chat")]
        name: String,
        #[tabled(rename = "Messages")]
        messages: usize,
        #[tabled(rename = "Created")]
        created: String,
    }

    let rows: Vec<ChatRow> = history
        .recent()
        .into_iter()
        .enumerate()
        .map(|(i, chat)| ChatRow {
            index: i + 1,
            current: if chat.id == history.current_id() { "▶" } else { "" }.to_string(),
            name: chat.name.clone(),
            messages: chat.messages().len(),
            created: chat.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("{}\n{}\n", "💬 Chat History".bold(), table)
}

/// First line of a description, cut to the table width
fn summarize(description: &str) -> String {
    let line = description.lines().next().unwrap_or("").trim();
    if line.chars().count() > DESCRIPTION_WIDTH {
        let head: String = line.chars().take(DESCRIPTION_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}
