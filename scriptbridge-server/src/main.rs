//! Script editor bridge server.
//!
//! Usage:
//!   scriptbridge-server serve --config scriptbridge.toml
//!   scriptbridge-server run --server 127.0.0.1:7788 script.lua
//!   scriptbridge-server run --server 127.0.0.1:7788 --all-clients script.lua

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptbridge_host::ServerConfig;
use scriptbridge_rpc::BridgeConfig;
use scriptbridge_server::{HeadlessClient, Server};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "scriptbridge-server")]
#[command(about = "Script editor bridge server")]
struct Args {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept game clients
    Serve {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "scriptbridge.toml")]
        config: PathBuf,

        /// Port to listen on, overriding the config file
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a script file through a running server
    Run {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:7788")]
        server: String,

        /// Run on every connected client instead of the server
        #[arg(long)]
        all_clients: bool,

        /// Call timeout in milliseconds
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,

        /// Lua script to run
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Serve { config, port } => serve(config, port).await,
        Command::Run {
            server,
            all_clients,
            timeout_ms,
            file,
        } => run(&server, all_clients, timeout_ms, file).await,
    }
}

async fn serve(config_path: PathBuf, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    if let Some(port) = port {
        config.port = port;
    }
    let activation_key = config.activation_key;

    let server = Server::bind(config).await.context("Failed to bind listener")?;
    let addr = server.local_addr()?;

    println!("\n========================================");
    println!("  Script Editor Bridge Running");
    println!("========================================");
    println!("  Listening:      {}", addr);
    println!("  Namespace:      {}", server.bridge().namespace());
    println!("  Activation key: {}", activation_key);
    println!("========================================\n");

    server.run().await.context("Listener failed")
}

async fn run(server: &str, all_clients: bool, timeout_ms: u64, file: PathBuf) -> Result<()> {
    let code = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    let config = BridgeConfig::default().with_timeout(Duration::from_millis(timeout_ms));
    let client = HeadlessClient::connect(server, config)
        .await
        .with_context(|| format!("Failed to connect to {}", server))?;
    info!("Connected to {}", server);

    let result = client.run(&code, all_clients).await;
    client.close();
    let value = result.context("Script failed")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
