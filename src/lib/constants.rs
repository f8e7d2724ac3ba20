//! Application constants
//!
//! Single source of truth for paths, defaults and wire-level limits.

/// Default configuration file path
pub const CONFIG_PATH: &str = "./config.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// Environment variable consulted for the API credential
pub const TOKEN_ENV_VAR: &str = "LUNATASK_BEARER_TOKEN";

/// Default LunaTask API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.lunatask.app/v1/";

/// Placeholder printed wherever the credential would otherwise appear
pub const REDACTED: &str = "***redacted***";

/// Largest page size the upstream accepts for list endpoints
pub const MAX_LIST_LIMIT: u32 = 50;

/// Prefix of the per-task detail URI attached to alias listings
pub const TASK_URI_PREFIX: &str = "lunatask://tasks/";
