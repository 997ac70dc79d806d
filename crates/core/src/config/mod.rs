//! Engine configuration.
//!
//! Values arrive pre-parsed from the embedding application; this module only
//! defines the shape, the defaults and a figment-based loader with
//! `VIDWELD_`-prefixed environment overrides.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::EngineConfig;
pub use validate::validate_config;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
