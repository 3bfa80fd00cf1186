//! Error types for Reel Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter error types
///
/// Only caller-originated faults are surfaced as `Err` values; backend
/// faults are modeled on the adapter state (see [`MediaError`]) and
/// announced through the `"error"` event instead.
#[derive(Error, Debug)]
pub enum Error {
    // Caller-originated argument errors (fail synchronously at the setter)
    #[error("Volume value must be between 0.0 and 1.0, got {0}")]
    InvalidVolume(f64),

    #[error("Invalid time value: {0}")]
    InvalidTime(f64),

    // Resolution errors
    #[error("No backend can play the supplied source(s)")]
    UnsupportedSource,

    #[error("Unknown backend kind: {0}")]
    UnknownBackendKind(String),

    // Backend lifecycle
    #[error("Backend construction failed: {0}")]
    BackendConstruction(String),

    #[error("Adapter has been torn down")]
    Destroyed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if this error reflects a bad argument from the caller
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Error::InvalidVolume(_) | Error::InvalidTime(_) | Error::InvalidConfig(_)
        )
    }
}

/// Numeric media error codes, matching the standard media-element model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    /// Fetch aborted at the user's request
    Aborted = 1,
    /// Network fault while fetching
    Network = 2,
    /// Decoding failure
    Decode = 3,
    /// No source could be used
    SrcNotSupported = 4,
    /// Backend-specific fault with no standard mapping
    Unknown = 5,
}

impl MediaErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// The error value exposed on the adapter's `error` field
///
/// Populated when a backend reports a playback, decoding, or network
/// fault, or when no backend can play the assigned source. Never thrown;
/// observers learn of it through the `"error"` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaError {
    pub name: String,
    pub message: String,
    pub code: MediaErrorCode,
}

impl MediaError {
    pub fn new(message: impl Into<String>, code: MediaErrorCode) -> Self {
        Self {
            name: "MediaError".to_string(),
            message: message.into(),
            code,
        }
    }

    /// The error reported when capability resolution finds no backend
    pub fn src_not_supported() -> Self {
        Self::new("Media Source Not Supported", MediaErrorCode::SrcNotSupported)
    }
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_media_element_numbers() {
        assert_eq!(MediaErrorCode::Aborted.as_u32(), 1);
        assert_eq!(MediaErrorCode::Network.as_u32(), 2);
        assert_eq!(MediaErrorCode::Decode.as_u32(), 3);
        assert_eq!(MediaErrorCode::SrcNotSupported.as_u32(), 4);
        assert_eq!(MediaErrorCode::Unknown.as_u32(), 5);
    }

    #[test]
    fn test_caller_fault_classification() {
        assert!(Error::InvalidVolume(1.5).is_caller_fault());
        assert!(!Error::UnsupportedSource.is_caller_fault());
    }
}
