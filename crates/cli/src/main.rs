//! webagent CLI: the main entry point.
//!
//! Commands:
//! - `serve`   start the HTTP gateway
//! - `ask`     answer one question, streaming to the terminal
//! - `chat`    interactive multi-turn session
//! - `models`  list configured models
//! - `config`  validate or print configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "webagent",
    about = "webagent: a tool-using research agent over OpenAI-compatible models",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// The question
        message: String,

        /// Model registry id (defaults to the configured default)
        #[arg(short, long)]
        model: Option<String>,

        /// Print the final answer and turn metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat interactively
    Chat {
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List configured models
    Models,

    /// Validate the configuration, or print the defaults
    Config {
        /// Print the default configuration as TOML
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so answers on stdout stay clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(host, port).await?,
        Commands::Ask {
            message,
            model,
            json,
        } => commands::ask::run(message, model, json).await?,
        Commands::Chat { model } => commands::chat::run(model).await?,
        Commands::Models => commands::models::run().await?,
        Commands::Config { default } => commands::config_cmd::run(default).await?,
    }

    Ok(())
}
