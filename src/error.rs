//! Error types for fragsql.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for fragsql operations.
#[derive(Error, Debug)]
pub enum FragsqlError {
    /// SQL text could not be parsed by the engine.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The statement is well formed but not accepted by the entry point
    /// it was submitted to.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Fragment definition or lookup errors.
    #[error("Fragment error: {0}")]
    Fragment(String),

    /// Catalog errors (object already exists, unknown object, etc.)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Semantic validation errors (unresolved references, sink mismatch, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors while reading scripts or config files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plan or result serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FragsqlError {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates an unsupported-statement error with the given message.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Creates a fragment error with the given message.
    pub fn fragment(msg: impl Into<String>) -> Self {
        Self::Fragment(msg.into())
    }

    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse(_) => "Parse Error",
            Self::Unsupported(_) => "Unsupported Statement",
            Self::Fragment(_) => "Fragment Error",
            Self::Catalog(_) => "Catalog Error",
            Self::Validation(_) => "Validation Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Serialization(_) => "Serialization Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<sqlparser::parser::ParserError> for FragsqlError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for FragsqlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using FragsqlError.
pub type Result<T> = std::result::Result<T, FragsqlError>;
