use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dbt_chat::agent::OpenAiRunner;
use dbt_chat::config::{Config, DbtCredentials, ENV_OPENAI_API_KEY};
use dbt_chat::llm::OpenAiClient;
use dbt_chat::mcp::HttpConnector;
use dbt_chat::ui::{render_tool_catalog, App};
use dbt_chat::{ConnectionManager, ConversationOrchestrator, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dbt-chat")]
#[command(author, version, about = "Chat with your dbt project through the dbt MCP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat {
        /// Model provider (OpenAI)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use (e.g., gpt-4o)
        #[arg(short, long)]
        model: Option<String>,

        /// Connect to the dbt MCP server on startup
        #[arg(long)]
        connect: bool,
    },

    /// List the tools offered by the dbt MCP server
    Tools {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the dbt MCP server is reachable with the current credentials
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials may come from a local .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    let filter = if cli.verbose { "dbt_chat=debug" } else { "dbt_chat=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    match cli.command.unwrap_or(Commands::Chat {
        provider: None,
        model: None,
        connect: false,
    }) {
        Commands::Chat {
            provider,
            model,
            connect,
        } => run_chat(config, provider, model, connect),
        Commands::Tools { json } => run_tools(config, json),
        Commands::Check => run_check(config),
    }
}

fn new_session(config: &Config) -> Result<Session> {
    let api_key = std::env::var(ENV_OPENAI_API_KEY).ok();
    Ok(Session::new(config.clone(), DbtCredentials::from_env(), api_key)?)
}

fn connection_manager() -> ConnectionManager {
    ConnectionManager::new(Arc::new(HttpConnector))
}

fn orchestrator(config: &Config) -> ConversationOrchestrator {
    let client = OpenAiClient::new(&config.llm.model)
        .with_base_url(&config.llm.base_url)
        .with_max_tokens(config.llm.max_tokens)
        .with_temperature(config.llm.temperature);
    let runner = OpenAiRunner::new(client)
        .with_max_turns(config.agent.max_turns)
        .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs));
    ConversationOrchestrator::new(Arc::new(runner))
}

fn run_chat(config: Config, provider: Option<String>, model: Option<String>, connect: bool) -> Result<()> {
    let mut session = new_session(&config)?;
    if let Some(provider) = provider {
        if session.model.set_provider(&provider).is_none() {
            anyhow::bail!("Unknown provider: {}", provider);
        }
    }
    if let Some(model) = model {
        session.model.model = model;
    }
    tracing::info!(
        "Starting chat with {} ({})",
        session.model.provider,
        session.model.model
    );

    let mut app = App::new(
        session,
        connection_manager(),
        orchestrator(&config),
        std::io::stdout(),
    );
    if connect {
        app.handle_line("/connect")?;
    }
    let result = app.run(std::io::stdin().lock());
    app.finish();
    result
}

fn run_tools(config: Config, json: bool) -> Result<()> {
    let mut session = new_session(&config)?;
    let manager = connection_manager();
    manager.connect(&mut session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.tools())?);
    } else {
        print!("{}", render_tool_catalog(session.tools()));
    }

    manager.disconnect(&mut session);
    session.shutdown();
    Ok(())
}

fn run_check(config: Config) -> Result<()> {
    let session = new_session(&config)?;
    let url = session.credentials.mcp_url();
    let result = connection_manager().check_connection(&session);
    session.shutdown();

    let count = result?;
    println!(
        "{} dbt MCP server at {} is reachable ({} tools)",
        "✓".green(),
        url,
        count
    );
    Ok(())
}
