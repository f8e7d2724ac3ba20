pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{LunaTaskClient, Scope};
pub use cli::{Cli, Command};
pub use config::{ConfigOverrides, ServerConfig};
pub use infrastructure::http::{ApiError, ErrorKind};

use config::LogLevel;
use std::error::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::load(cli.config_file.as_deref(), &cli.overrides())?;
    init_tracing(config.log_level);
    info!("Starting lunatask-mcp");
    debug!(command = ?cli.command, "CLI arguments parsed");
    match &config.config_file {
        Some(path) => info!(path = %path.display(), "Loaded configuration from file"),
        None => info!("Loaded configuration from environment and defaults"),
    }
    info!(config = %config.to_redacted_json(), "Effective configuration");

    if cli.command == Command::Config {
        println!("{}", serde_json::to_string_pretty(&config.to_redacted_json())?);
        return Ok(());
    }

    let client = LunaTaskClient::from_config(&config)?;
    if config.test_connectivity_on_startup && cli.command != Command::Ping {
        if !client.test_connectivity().await {
            warn!("Startup connectivity test failed; continuing");
        }
    }

    match cli.command {
        Command::Ping => {
            let reachable = client.test_connectivity().await;
            println!("{}", serde_json::json!({ "ok": reachable }));
            if !reachable {
                return Err("LunaTask API connectivity test failed".into());
            }
        }
        Command::Tasks { alias, area } => {
            let scope = match area {
                Some(area_id) => Scope::area(area_id)?,
                None => Scope::Global,
            };
            let listing = client.list_alias(&alias, scope).await?;
            println!("{}", serde_json::to_string_pretty(&listing.to_json()?)?);
        }
        Command::Task { id } => {
            let task = client.get_task(&id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Command::Config => {}
    }
    info!("Command finished");
    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing(level: LogLevel) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_filter().to_string()));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
