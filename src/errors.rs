// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchtreeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Input missing or unreadable. Non-fatal: modelled as absent content.
    #[error("Source unavailable: {0:?}")]
    SourceUnavailable(PathBuf),

    /// Output could not be written. Fatal to that one Write attempt only.
    #[error("Failed to write {path:?}: {message}")]
    WriteFailure { path: PathBuf, message: String },

    /// A watch subscription could not be established.
    #[error("Failed to watch {path:?}: {message}")]
    WatchSetupFailure { path: PathBuf, message: String },

    /// The OS refused to allocate another watch handle.
    #[error("Watch limit reached while watching {0:?}")]
    WatchLimit(PathBuf),

    #[error("Unrecognized change event: {0}")]
    UnrecognizedEvent(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchtreeError {
    /// Whether this error should stop the process rather than stay local to
    /// the node that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchtreeError::WatchLimit(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchtreeError>;
