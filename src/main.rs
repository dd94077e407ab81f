use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use relay_agent::{CliAgent, CliAgentConfig};
use relay_server::ServerConfig;

/// Streaming bridge between HTTP clients and the agent CLI.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Agent CLI binary to spawn for queries. Defaults to `RELAY_AGENT_BIN`
    /// or `claude`.
    #[arg(long)]
    agent_bin: Option<String>,

    /// Project root for command discovery and directive execution.
    #[arg(long)]
    commands_dir: Option<PathBuf>,

    /// Evict sessions idle longer than this many seconds.
    #[arg(long, default_value_t = 1800)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting relay server");

    let mut agent_config = CliAgentConfig::from_env();
    if let Some(bin) = cli.agent_bin {
        agent_config.program = bin;
    }
    let agent = Arc::new(CliAgent::new(agent_config));

    let mut config = ServerConfig {
        port: cli.port,
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
        ..Default::default()
    };
    if let Some(dir) = cli.commands_dir {
        config.project_root = dir;
    }

    let handle = relay_server::start(config, agent)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "Relay server ready");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
