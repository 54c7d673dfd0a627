//! Error types for maestro-core

use thiserror::Error;

/// Result type alias for maestro-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a practice session.
///
/// None of the conditions a musician can trigger by speaking (unknown
/// phrases, missing numbers, no PDF loaded) are errors; those produce a
/// spoken response instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sheet music file does not exist
    #[error("PDF not found: {0}")]
    PdfNotFound(String),

    /// Viewer collaborator failed to open a page
    #[error("Viewer error: {0}")]
    Viewer(String),

    /// Background thread could not be started
    #[error("Failed to spawn {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A background worker is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Utterance rule failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
