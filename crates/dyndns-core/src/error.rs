//! Error types for the dynamic DNS scheduler
//!
//! This module defines all error types used throughout the crate.
//!
//! None of these errors are fatal to the host process. The scheduler
//! catches every error at the cycle boundary and turns it into a log
//! entry plus a [`CycleOutcome`](crate::scheduler::CycleOutcome).

use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dynamic DNS scheduler
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing option, malformed server URI)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote service is currently unreachable
    #[error("Service offline: {0}")]
    Offline(String),

    /// Session establishment failed for a reason other than being offline
    #[error("Connection error: {0}")]
    Connection(String),

    /// The DNS update operation itself failed
    #[error("DNS update error: {0}")]
    Update(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an offline error
    pub fn offline(msg: impl Into<String>) -> Self {
        Self::Offline(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an update error
    pub fn update(msg: impl Into<String>) -> Self {
        Self::Update(msg.into())
    }

    /// Whether this error means "service unreachable" rather than a hard failure
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }

    /// Whether this error stems from configuration or environment assumptions
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
