//! Error types for hostdesk-core
//!
//! The detection core itself has no fatal error path: every branch inside a
//! cycle degrades to "skip" or "suppress". These errors cover the edges the
//! core touches on behalf of callers — session persistence, configuration,
//! and the ticket repository seam.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hostdesk-core
#[derive(Debug, Error)]
pub enum Error {
    /// Session document could not be read or written
    #[error("session persistence failed: {0}")]
    SessionIo(#[from] std::io::Error),

    /// Session document did not parse as the expected JSON shape
    #[error("session document malformed: {0}")]
    SessionFormat(#[from] serde_json::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The ticket repository rejected or failed an operation
    #[error("ticket repository error: {0}")]
    TicketRepository(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file did not parse as TOML
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    /// No data directory could be resolved for defaults
    #[error("could not resolve a data directory for session storage")]
    NoDataDir,
}
