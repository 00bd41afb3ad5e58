mod config;
mod error;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, Parser};
use mcp::ServerConfig;
use runtime::{
    AnthropicBackend, Backend, Conversation, GeminiBackend, McpToolHost, Provider, ToolHost,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, ProviderKind};
use error::Result;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Chat with a model that can call tools from an MCP server", long_about = None)]
#[command(version)]
struct Cli {
    /// MCP server script to launch (.py or .js)
    server: Option<PathBuf>,

    /// Config file (defaults to ./relay.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// The server script, or the usage line to print when it's missing.
    fn server_or_usage(&self) -> std::result::Result<&Path, String> {
        self.server
            .as_deref()
            .ok_or_else(|| Cli::command().render_usage().to_string())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let server = match cli.server_or_usage() {
        Ok(server) => server,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(server, cli.config.as_deref()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run(server: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = Config::discover(config_path)?;
    let backend = build_backend(&config)?;
    info!(backend = %backend, "model backend ready");

    let server_config = ServerConfig::from_script(server)?;
    let host = McpToolHost::connect(&server_config, config.session.request_timeout()).await?;

    let mut chat = Conversation::with_config(backend, host, config.conversation());
    println!(
        "\nConnected to server with tools: {:?}",
        chat.manifest().names()
    );

    let outcome = chat_loop(&mut chat).await;
    chat.shutdown().await;
    outcome
}

fn build_backend(config: &Config) -> Result<Provider> {
    let api_key = config.api_key()?;
    let model = config.model_name();
    let base_url = config.model.base_url.as_deref();

    let provider: Provider = match config.model.provider {
        ProviderKind::Anthropic => {
            let mut builder = AnthropicBackend::builder(api_key, model);
            if let Some(url) = base_url {
                builder = builder.base_url(url);
            }
            builder.build().into()
        }
        ProviderKind::Gemini => {
            let mut backend = GeminiBackend::new(api_key, model);
            if let Some(url) = base_url {
                backend = backend.with_base_url(url);
            }
            backend.into()
        }
    };
    Ok(provider)
}

async fn chat_loop<B: Backend, H: ToolHost>(chat: &mut Conversation<B, H>) -> Result<()> {
    println!("\nrelay v{}", env!("CARGO_PKG_VERSION"));
    println!("Type your queries or 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nQuery: ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        // EOF
        let Some(line) = line else {
            println!();
            break;
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        tokio::select! {
            result = chat.process_query(query) => match result {
                Ok(answer) => println!("\n{answer}"),
                Err(e) => eprintln!("\nError: {e}"),
            },
            // Dropping the query leaves history untouched; the session stays up.
            _ = tokio::signal::ctrl_c() => println!("\nInterrupted."),
        }
    }

    Ok(())
}
