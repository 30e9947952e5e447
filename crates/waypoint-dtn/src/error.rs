//! DTN-specific error types

use thiserror::Error;

/// Errors that can occur while driving a router
#[derive(Debug, Error)]
pub enum RouterError {
    /// A connected peer does not expose delivery predictability.
    ///
    /// The protocol assumes every node runs a predictability-aware router,
    /// so this is a contract violation rather than a recoverable condition.
    #[error("Peer {peer} does not expose delivery predictability")]
    IncompatiblePeer { peer: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory setting is absent
    #[error("Missing required setting `{key}`")]
    MissingSetting { key: &'static str },

    /// A setting is present but unusable
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    /// The settings namespace table is missing from the document
    #[error("Settings namespace `{0}` not found")]
    MissingNamespace(String),

    /// TOML parse failure
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings file could not be read
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
