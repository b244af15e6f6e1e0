//! Error types for AVSync
//!
//! This module defines the custom error type used throughout the crate.
//! We use thiserror for convenient error type definitions. The refresh loop
//! itself never propagates errors to callers; these types surface on the
//! construction and configuration paths.

use thiserror::Error;

/// Main error type for AVSync
#[derive(Error, Debug)]
pub enum SyncError {
    /// Clock-related errors
    #[error("Clock error: {0}")]
    Clock(String),

    /// Frame queue errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Render/presentation errors
    #[error("Render error: {0}")]
    Render(String),

    /// Pixel conversion errors
    #[error("Scaler error: {0}")]
    Scaler(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience type alias for Results in AVSync
pub type Result<T> = std::result::Result<T, SyncError>;

/// Extension trait for converting other errors to SyncError
pub trait IntoSyncError<T> {
    /// Convert this error into a render error with the given context
    fn render_err(self, context: &str) -> Result<T>;
    /// Convert this error into a scaler error with the given context
    fn scaler_err(self, context: &str) -> Result<T>;
    /// Convert this error into a configuration error with the given context
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoSyncError<T> for std::result::Result<T, E> {
    fn render_err(self, context: &str) -> Result<T> {
        self.map_err(|e| SyncError::Render(format!("{}: {}", context, e)))
    }

    fn scaler_err(self, context: &str) -> Result<T> {
        self.map_err(|e| SyncError::Scaler(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| SyncError::Config(format!("{}: {}", context, e)))
    }
}
