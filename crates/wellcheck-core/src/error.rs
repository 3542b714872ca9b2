//! Core error types for wellcheck-core.
//!
//! This module defines the error hierarchy using thiserror. Input problems
//! inside scoring (unknown question ids, unmatched option values) are not
//! errors at all: they are logged and skipped. The types here cover caller
//! mistakes against the quiz API, storage failures, and bad configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::quiz::StageStatus;

/// Core error type for wellcheck-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Quiz state machine errors
    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Persistence-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Question bank / recommendation content errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the multi-stage orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuizError {
    /// Stage id is not part of the quiz plan
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// Stage has not been unlocked yet
    #[error("Stage '{0}' is locked")]
    StageLocked(String),

    /// Requested transition does not apply to the stage's current status
    #[error("Cannot {action} stage '{stage}' while it is {from:?}")]
    InvalidTransition {
        stage: String,
        from: StageStatus,
        action: &'static str,
    },

    /// Result is not scored out of the stage's question count
    #[error("Invalid result for stage '{stage}': score {total_score} of {max_score} does not fit the stage")]
    InvalidResult {
        stage: String,
        total_score: u32,
        max_score: u32,
    },
}

/// Persistence-specific errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Backing store read failed
    #[error("Failed to read key '{key}': {message}")]
    ReadFailed { key: String, message: String },

    /// Backing store write failed (quota, permissions, ...)
    #[error("Failed to write key '{key}': {message}")]
    WriteFailed { key: String, message: String },

    /// Snapshot could not be serialized or parsed
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot was written by an incompatible schema version
    #[error("Schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: String, expected: String },

    /// Export checksum does not match its payload
    #[error("Checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    /// Snapshot violates structural or semantic invariants
    #[error("Snapshot rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Content (question bank) errors.
#[derive(Error, Debug)]
pub enum ContentError {
    /// Failed to parse a content library document
    #[error("Failed to parse content library: {0}")]
    ParseFailed(#[from] toml::de::Error),

    /// Failed to read a content library file
    #[error("Failed to read content library at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Assessment has no questions for any locale
    #[error("No questions for assessment '{0}'")]
    EmptyAssessment(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
