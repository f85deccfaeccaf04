//! Core error types for bounce-core.
//!
//! This module defines the error hierarchy using thiserror. Component
//! failures bubble up through `CoreError`; the message dispatcher is the
//! boundary that converts them into `{ok: false, error}` responses.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for bounce-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent-state store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Declarative rule engine errors
    #[error("Rule engine error: {0}")]
    RuleEngine(#[from] RuleEngineError),

    /// Decision service errors
    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Persistent-state store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to read the persisted record
    #[error("Failed to read state from {path}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    /// Failed to write the persisted record
    #[error("Failed to write state to {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    ConfigSaveFailed { path: PathBuf, message: String },
}

/// Declarative rule engine errors.
#[derive(Error, Debug)]
pub enum RuleEngineError {
    /// Batch rule update failed
    #[error("Rule batch update failed: {0}")]
    UpdateFailed(String),

    /// Listing live rules failed
    #[error("Rule listing failed: {0}")]
    ListFailed(String),
}

/// Decision service errors.
#[derive(Error, Debug)]
pub enum DecisionError {
    /// Endpoint is not a valid URL
    #[error("Invalid decision endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the decision contract
    #[error("Malformed decision payload: {0}")]
    MalformedPayload(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
