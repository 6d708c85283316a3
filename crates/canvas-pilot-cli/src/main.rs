use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use canvas_pilot_client::HttpCanvasApi;
use canvas_pilot_core::config::Config;
use canvas_pilot_core::identity::resolve_installation_name;
use canvas_pilot_gateway::GatewayState;

mod logging;

#[derive(Parser)]
#[command(
    name = "canvas-pilot",
    about = "Follows the active canvas of a display client and runs zone macros on it",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session tracker and the local gateway
    Serve {
        /// Port to listen on (default: 8090)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show resolved configuration and, if a gateway is running, its session
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (secrets redacted)
    Show,
    /// Check configuration for errors
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    logging::init(config.logging.as_ref(), cli.verbose);

    match cli.command {
        Commands::Serve { port } => serve(config, port).await?,
        Commands::Status => status(&config, &config_path).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&redacted(&config))?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK: {}", config_path.display());
            }
        },
    }

    Ok(())
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for w in &warnings {
        tracing::warn!("{w}");
    }
    if !errors.is_empty() {
        bail!("invalid configuration: {}", errors.join("; "));
    }

    let server = config
        .server
        .as_ref()
        .context("no server configured (server.base_url)")?;
    let api = Arc::new(HttpCanvasApi::new(server)?);
    let port = port.unwrap_or_else(|| config.gateway_port());

    tracing::info!(
        base_url = %api.base_url,
        installation_name = %resolve_installation_name(&config),
        "Starting canvas-pilot on port {port}"
    );

    #[allow(unused_mut)]
    let mut state = GatewayState::build(Arc::new(config), api, CancellationToken::new());

    #[cfg(feature = "metrics")]
    {
        match canvas_pilot_gateway::metrics::install_prometheus_recorder() {
            Ok(handle) => state.metrics_handle = Some(handle),
            Err(e) => tracing::warn!(error = %e, "Metrics recorder not installed"),
        }
    }

    canvas_pilot_gateway::start_gateway(Arc::new(state), port).await
}

async fn status(config: &Config, config_path: &std::path::Path) {
    println!("canvas-pilot v{}", env!("CARGO_PKG_VERSION"));
    println!("Config: {}", config_path.display());
    match &config.server {
        Some(server) => println!("Server: {}", server.base_url),
        None => println!("Server: (not configured)"),
    }
    println!("Installation name: {}", resolve_installation_name(config));
    println!(
        "Gateway: {}:{}",
        config.gateway_bind(),
        config.gateway_port()
    );

    let url = format!(
        "http://{}:{}/api/status",
        config.gateway_bind(),
        config.gateway_port()
    );
    let running = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => match client.get(&url).send().await {
            Ok(resp) => resp.json::<serde_json::Value>().await.ok(),
            Err(_) => None,
        },
        Err(_) => None,
    };

    match running {
        Some(session) => {
            println!("Status: running");
            println!("Client: {}", session["client_id"].as_str().unwrap_or(""));
            println!(
                "Canvas: {} ({})",
                session["canvas_name"].as_str().unwrap_or(""),
                session["canvas_id"].as_str().unwrap_or("")
            );
            println!("Connected: {}", session["connected"].as_bool().unwrap_or(false));
        }
        None => println!("Status: not running"),
    }
}

fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(server) = config.server.as_mut() {
        if server.token.is_some() {
            server.token = Some("********".into());
        }
    }
    config
}
