//! Error types for the PARAKEET engine
//!
//! This module contains all error types used throughout the engine, including
//! transport errors, storage errors, and the main `ParakeetError` type that
//! unifies them all. The taxonomy mirrors how failures are scoped: validation
//! and configuration errors reject a single operation, transport errors
//! poison the channel they occurred on, and storage corruption fails fast.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Specific transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Unable to load trusted frame for origin '{origin}': {reason}")]
    FrameLoadFailed { origin: String, reason: String },
    #[error("Transport channel is not ready: {reason}")]
    ChannelNotReady { reason: String },
    #[error("Transport channel closed: {reason}")]
    ChannelClosed { reason: String },
    #[error("No trust origin configured")]
    NoTrustOrigin,
}

/// Specific storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The persisted record could not be decoded. This is deliberately not
    /// auto-recovered: silently replacing the record would drop private
    /// interest data, so the caller must clear storage explicitly.
    #[error("Stored interest record is unreadable ({reason}); persistent storage must be cleared")]
    Corrupted { reason: String },
    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },
}

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

/// Core error type for the PARAKEET engine
#[derive(Debug, thiserror::Error)]
pub enum ParakeetError {
    /// Malformed caller input (bad duration, unparseable payload shape)
    #[error("Validation error: {reason}")]
    Validation { reason: String },

    /// Trust-origin or context misconfiguration
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// Channel establishment or messaging failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON encoding/decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An `Error`-tagged response envelope from the remote session
    #[error("Remote operation failed: {message}")]
    Remote { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ParakeetError {
    /// Create a validation error with a reason
    pub fn validation<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Validation {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a frame-load transport error
    pub fn frame_load_failed<O: Into<String>, R: Into<String>>(origin: O, reason: R) -> Self {
        ParakeetError::Transport(TransportError::FrameLoadFailed {
            origin: origin.into(),
            reason: reason.into(),
        })
    }

    /// Create a channel-not-ready transport error
    pub fn channel_not_ready<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Transport(TransportError::ChannelNotReady {
            reason: reason.into(),
        })
    }

    /// Create a channel-closed transport error
    pub fn channel_closed<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Transport(TransportError::ChannelClosed {
            reason: reason.into(),
        })
    }

    /// Create a corrupt-record storage error
    pub fn storage_corrupted<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Storage(StorageError::Corrupted {
            reason: reason.into(),
        })
    }

    /// Create a backend storage error
    pub fn storage_backend<T: Into<String>>(reason: T) -> Self {
        ParakeetError::Storage(StorageError::Backend {
            reason: reason.into(),
        })
    }

    /// Create a remote-failure error from an error envelope
    pub fn remote<T: Into<String>>(message: T) -> Self {
        ParakeetError::Remote {
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ParakeetError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
