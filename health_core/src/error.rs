//! Error types for the health_core library.

use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when a store rejection carries no message of its own
pub const GENERIC_SAVE_FAILURE: &str = "Could not save your changes. Please try again.";

/// Core error type for health_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No signed-in user; nothing may be queried or edited
    #[error("Not signed in: no user identity is configured")]
    Unauthenticated,

    /// A record key could not be decoded
    #[error("Invalid entry key: {0}")]
    InvalidKey(String),

    /// The store rejected a read or write
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Structured rejection payload returned by a store.
///
/// The message is optional because remote stores do not always provide one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreError {
    pub message: Option<String>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// A rejection without a human-readable message
    pub fn opaque() -> Self {
        Self { message: None }
    }

    /// Message suitable for showing next to the field that failed to save
    pub fn user_message(&self) -> String {
        match self.message.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => GENERIC_SAVE_FAILURE.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
