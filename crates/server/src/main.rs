use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;
mod middleware;
mod session;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "puzzlecats")]
#[command(about = "MCP gateway exposing Slack and GitHub search to AI clients", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "puzzlecats.toml", env = "PUZZLECATS_CONFIG")]
    config: PathBuf,

    /// Host to bind to (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "puzzlecats=info,puzzlecats_mcp=info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    tracing::info!("Starting Puzzlecats MCP gateway");

    // Load configuration: file, then environment, then command line
    let mut config = ServerConfig::load(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    api::serve(config).await?;

    Ok(())
}
