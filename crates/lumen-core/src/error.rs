//! Error types for Lumen Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // Errors reported by the native backend via its error callback
    #[error("Native backend error {code}: {message}")]
    NativeBackend {
        code: i32,
        message: String,
        details: Option<String>,
    },

    // DRM negotiation or license rejection
    #[error("DRM negotiation failed: {0}")]
    Drm(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a DRM error
    pub fn drm(msg: impl Into<String>) -> Self {
        Error::Drm(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Returns true if this error tears down the session.
    ///
    /// Backend-reported errors are surfaced as events and leave the engine
    /// state untouched; recovery is the orchestrating layer's job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Drm(_))
    }

    /// Returns the stable error code for event payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "INVALID_CONFIG",
            Error::NativeBackend { .. } => "NATIVE_BACKEND",
            Error::Drm(_) => "DRM_NEGOTIATION",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
