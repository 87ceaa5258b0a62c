use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the LearnHub guard crates.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A component that schedules timers was created outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// A scenario file could not be opened or read from disk.
    #[error("Failed to read scenario {path}: {source}")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An auth status string is not one of the recognised values.
    #[error("Invalid auth status: {0}")]
    InvalidStatus(String),

    /// A protected-route pattern could not be parsed.
    #[error("Invalid route pattern: {0}")]
    InvalidRoutePattern(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the guard crates.
pub type Result<T> = std::result::Result<T, GuardError>;
