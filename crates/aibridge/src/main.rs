//! aibridge - AiBridge command line client
//!
//! Authenticates against the conversation service, opens the token-gated
//! WebSocket and relays frames between the terminal and the service.

use std::path::PathBuf;

use aibridge::{BridgeConfig, ConnectionOrchestrator, SessionEvent};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "aibridge")]
#[command(about = "AiBridge authenticated WebSocket client")]
#[command(version)]
struct Cli {
    /// Enable debug logging and verbose lifecycle logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and relay stdin lines as text frames
    Connect {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Fetch a bearer token and print its expiry
    Token {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Print the full token instead of a redacted prefix
        #[arg(long)]
        reveal: bool,
    },

    /// Probe the service health endpoint
    Health {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "aibridge.toml")]
        output: PathBuf,

        /// Service base URL
        #[arg(long, default_value = "https://conversation-api.com")]
        base_url: String,
    },
}

#[derive(Args)]
struct ConnectionArgs {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service base URL
    #[arg(long, env = "AIBRIDGE_BASE_URL")]
    base_url: Option<String>,

    /// API key sent to the auth endpoint
    #[arg(long, env = "AIBRIDGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// User identity
    #[arg(long, env = "AIBRIDGE_USER_ID")]
    user_id: Option<String>,

    /// User role
    #[arg(long)]
    role: Option<String>,
}

impl ConnectionArgs {
    fn load(self, verbose: bool) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(api_key) = self.api_key {
            config.credentials.api_key = api_key;
        }
        if let Some(user_id) = self.user_id {
            config.credentials.user_id = user_id;
        }
        if let Some(role) = self.role {
            config.credentials.role = role;
        }
        config.verbose |= verbose;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("aibridge={level}").parse()?)
                .add_directive(format!("aibridge_auth={level}").parse()?),
        )
        .init();

    match cli.command {
        Commands::Connect { connection } => {
            run_connect(connection.load(cli.verbose)?).await?;
        }

        Commands::Token { connection, reveal } => {
            fetch_token(connection.load(cli.verbose)?, reveal).await?;
        }

        Commands::Health { connection } => {
            check_health(connection.load(cli.verbose)?).await?;
        }

        Commands::InitConfig { output, base_url } => {
            init_config(output, base_url)?;
        }
    }

    Ok(())
}

async fn run_connect(config: BridgeConfig) -> anyhow::Result<()> {
    info!(base_url = %config.base_url(), user_id = %config.credentials.user_id, "starting aibridge");

    let (bridge, mut events) = ConnectionOrchestrator::new(config)?;
    let startup = bridge.start();

    if !bridge.ensure_connected().await {
        anyhow::bail!("could not connect to the service");
    }
    if let Ok(report) = startup.await {
        info!(service_up = ?report.service_up, token_prefetched = report.token_prefetched, "startup complete");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !print_event(&event) {
                    break;
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.is_empty() => {}
                    Some(line) => {
                        if !bridge.send_text(line) {
                            error!("not connected, frame dropped");
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    bridge.shutdown();
    Ok(())
}

/// Print an event. Returns `false` once the session cannot recover.
fn print_event(event: &SessionEvent) -> bool {
    match event {
        SessionEvent::Connected => println!("* connected"),
        SessionEvent::Disconnected { reason } => println!("* disconnected: {reason}"),
        SessionEvent::Reconnecting { attempt, delay } => {
            println!("* reconnecting (attempt {attempt}) in {delay:?}");
        }
        SessionEvent::ReconnectFailed { attempts } => {
            println!("* gave up after {attempts} reconnect attempts");
            return false;
        }
        SessionEvent::Text(text) => println!("{text}"),
        SessionEvent::Binary(data) => println!("<{} bytes>", data.len()),
        SessionEvent::Error(message) => println!("! {message}"),
    }
    true
}

async fn fetch_token(config: BridgeConfig, reveal: bool) -> anyhow::Result<()> {
    let (bridge, _events) = ConnectionOrchestrator::new(config)?;
    let token = bridge.fetch_token().await?;

    let value = if reveal {
        token.value().to_string()
    } else {
        let prefix: String = token.value().chars().take(8).collect();
        format!("{prefix}...")
    };

    println!("Token:      {value}");
    println!("Issued at:  {}", token.issued_at());
    println!("Expires at: {}", token.expires_at());
    Ok(())
}

async fn check_health(config: BridgeConfig) -> anyhow::Result<()> {
    let base_url = config.base_url().to_string();
    let (bridge, _events) = ConnectionOrchestrator::new(config)?;

    if bridge.probe_health().await {
        println!("{base_url}: up");
        Ok(())
    } else {
        anyhow::bail!("{base_url}: unreachable")
    }
}

fn init_config(output: PathBuf, base_url: String) -> anyhow::Result<()> {
    let config = BridgeConfig {
        base_url,
        ..BridgeConfig::default()
    };
    config.validate()?;
    config.write_to(&output)?;

    println!("Config written to: {}", output.display());
    println!("Set credentials.user_id and credentials.api_key before connecting.");
    Ok(())
}
