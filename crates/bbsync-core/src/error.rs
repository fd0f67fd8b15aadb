//! Sync error handling
//!
//! Every failure the engine can hit maps onto one of these variants. None of
//! them are fatal: the engine turns each into a user-visible notification.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::notification::Level;

/// Errors that can occur while configuring, watching or pushing files
#[derive(Error, Debug)]
pub enum SyncError {
    /// A setting was provided at a scope where it is not honoured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No auth token has been stored yet
    #[error("No auth token configured. Set one with `bbsync auth set <TOKEN>` (copy it from the game's API server options).")]
    AuthNotConfigured,

    /// The file does not match any of the syncable extensions
    #[error("'{path}' is not a syncable file. Valid extensions: {extensions}")]
    InvalidFileType { path: PathBuf, extensions: String },

    /// The game rejected the bearer token (HTTP 401)
    #[error("The game rejected the auth token while pushing '{filename}'. Check that the token matches the one shown in the game.")]
    RemoteAuthRejected { filename: String },

    /// The game answered with a status other than 200 or 401
    #[error("Failed to push '{filename}' to the game (status {status}): {body}")]
    RemoteRequestFailed {
        filename: String,
        status: u16,
        body: String,
    },

    /// The request never got a response (connection refused, reset, ...)
    #[error("Failed to reach the game while pushing '{filename}': {message}")]
    Transport { filename: String, message: String },

    /// A source file could not be read before pushing it
    #[error("Failed to read '{path}': {source}")]
    FileSystemRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory expected to exist was missing
    #[error("Directory not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The filesystem watch primitive refused the subscription
    #[error("Failed to watch '{path}': {message}")]
    Watch { path: PathBuf, message: String },

    /// A configuration or secret file could not be read, parsed or written
    #[error("Invalid config file '{path}': {details}")]
    ConfigFile { path: PathBuf, details: String },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Notification level used when surfacing this error
    pub fn level(&self) -> Level {
        match self {
            SyncError::Configuration(_) => Level::Warning,
            _ => Level::Error,
        }
    }

    /// Classify an I/O error raised while reading a file to push
    pub fn from_read(error: io::Error, path: PathBuf) -> Self {
        SyncError::FileSystemRead {
            path,
            source: error,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
