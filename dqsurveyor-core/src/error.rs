//! Error types for dqlite diagnostic collection.
//!
//! Almost nothing in a collection run is fatal: transport failures are
//! recorded per query and topology problems degrade to an alert. The variants
//! here cover the failures that callers actually need to see, such as an
//! unwritable output directory or an invalid configuration.
//!
//! Error messages never include collected output or socket payloads, since
//! either may carry secrets that have not been redacted yet.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for DQSurveyor operations.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A command could not be spawned or awaited
    #[error("Command execution failed: {command}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A command did not finish within the configured timeout
    #[error("Command timed out after {timeout_secs}s: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },

    /// A topology file was readable but could not be interpreted
    #[error("Failed to parse {}: {reason}", path.display())]
    Topology { path: PathBuf, reason: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A redaction or parsing pattern failed to compile
    #[error("Invalid pattern '{name}'")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// The collection run was cancelled before this step was issued
    #[error("Collection cancelled")]
    Cancelled,
}

/// Convenience type alias for Results with CollectError
pub type Result<T> = std::result::Result<T, CollectError>;

impl CollectError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a topology error for a file that was read but not understood
    pub fn topology(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Topology {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a pattern compilation error
    pub fn pattern(name: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            name: name.into(),
            source,
        }
    }

    /// Creates a serialization error with context
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }
}
