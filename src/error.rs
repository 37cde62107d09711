//! Error types

use thiserror::Error;

/// Errors surfaced by the hunter runtime
#[derive(Error, Debug)]
pub enum HunterError {
    /// The frame source is gone; fatal to the running session
    #[error("Capture source lost: {0}")]
    CaptureLost(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An engagement session is already open
    #[error("Engagement already active on entity {0}")]
    SessionActive(u64),

    #[error("Hunter is already running")]
    AlreadyRunning,

    /// Start was requested with no frame source or input sink attached
    #[error("No devices attached")]
    NotAttached,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),
}

/// Errors raised while loading or saving configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// A single record that could not be understood
    #[error("Invalid record at {location}: {reason}")]
    InvalidRecord { location: String, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, HunterError>;
