//! Errors raised while reading profile and firewall documents or driving
//! the signing authority.

use std::time::Duration;
use thiserror::Error;

/// The main error type for nebula-utils operations.
///
/// This enum covers every failure that can occur while loading profile and
/// policy documents, expanding ACL groups, and driving the external signing
/// authority.
#[derive(Error, Debug)]
pub enum NutilsError {
    /// A source document or device profile does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// A document is not well-formed YAML or has the wrong overall shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A document parsed but an entry is missing a field or holds an invalid value
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// The external signing authority could not be run or exited non-zero
    #[error("{tool} failed ({status}): {diagnostic}")]
    ExternalToolError {
        /// Operation that was attempted, e.g. `nebula-cert keygen`.
        tool: String,
        /// Exit status description.
        status: String,
        /// Diagnostic text reported by the tool.
        diagnostic: String,
    },

    /// The external signing authority did not exit within the configured limit
    #[error("{tool} timed out after {}s", .after.as_secs())]
    TimeoutError {
        /// Operation that was attempted.
        tool: String,
        /// The limit that was exceeded.
        after: Duration,
    },

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for nebula-utils operations.
pub type Result<T> = std::result::Result<T, NutilsError>;
