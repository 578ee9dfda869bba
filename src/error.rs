//! Configuration errors shared by the component builders.
//!
//! Every configuration struct in `mqframe` is immutable once built; builders
//! validate their inputs and report problems through [`ConfigError`] instead
//! of failing later at first use.

use thiserror::Error;

use crate::record::LayoutError;

/// Invalid configuration detected while building a component.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required queue name was empty.
    #[error("{0} queue name must not be empty")]
    EmptyQueueName(&'static str),
    /// Two internal header fields were mapped to the same wire field.
    #[error("wire field {0} is mapped more than once")]
    DuplicateWireName(String),
    /// Header keys selected for writing are not part of the field mapping.
    #[error("header key {0} has no wire mapping")]
    UnmappedHeaderKey(String),
    /// An action was already registered for the request id.
    #[error("request id {0} was already registered")]
    DuplicateRoute(String),
    /// An action was registered under an empty request id.
    #[error("request id must not be empty")]
    EmptyRequestId,
    /// A count that must be positive was zero.
    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
    /// A name used for persisted data was empty.
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
    /// A record layout defined in configuration is inconsistent.
    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings document is not valid TOML for [`crate::config::Settings`].
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),
}
