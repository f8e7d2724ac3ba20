use crate::config::ConfigOverrides;
use crate::infrastructure::http::BearerToken;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lunatask-mcp",
    version,
    about = "Rate-limited LunaTask API client with client-side task views"
)]
pub struct Cli {
    /// TOML configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    pub config_file: Option<PathBuf>,
    /// DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// Bearer token; prefer LUNATASK_BEARER_TOKEN so it stays out of shell history
    #[arg(long)]
    pub token: Option<BearerToken>,
    #[arg(long)]
    pub rate_limit_rpm: Option<i64>,
    #[arg(long)]
    pub rate_limit_burst: Option<i64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check credentials and reachability
    Ping,
    /// List tasks for an alias (now, today, overdue, next_7_days, high_priority, recent_completions)
    Tasks {
        alias: String,
        /// Restrict to one area instead of the global scope
        #[arg(long)]
        area: Option<String>,
    },
    /// Fetch one task
    Task { id: String },
    /// Print the effective configuration with secrets redacted
    Config,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            rate_limit_rpm: self.rate_limit_rpm,
            rate_limit_burst: self.rate_limit_burst,
        }
    }
}
