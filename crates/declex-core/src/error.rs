//! Error types for declex

use thiserror::Error;

/// declex error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Result type alias for declex
pub type Result<T> = std::result::Result<T, Error>;
