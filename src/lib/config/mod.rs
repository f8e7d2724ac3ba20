pub mod app;
pub mod error;
pub mod loader;

pub use app::{ConfigOverrides, LogLevel, ServerConfig};
pub use error::ConfigError;
