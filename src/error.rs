//! Error handling for Trimline
//!
//! Every error carries a stable code and, where it makes sense, hints for
//! the caller on how to recover.

use thiserror::Error;

/// Result type alias for Trimline operations
pub type Result<T> = std::result::Result<T, TrimlineError>;

/// Main error type for Trimline operations
#[derive(Error, Debug)]
pub enum TrimlineError {
    // Caller Errors
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Illegal state: {reason}")]
    IllegalState { reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Stream Errors
    #[error("Stream is closed")]
    StreamClosed,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrimlineError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        TrimlineError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn format_not_set() -> Self {
        TrimlineError::IllegalState {
            reason: "audio format is not set".to_string(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            TrimlineError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            TrimlineError::IllegalState { .. } => "ILLEGAL_STATE",
            TrimlineError::FileNotFound { .. } => "FILE_NOT_FOUND",
            TrimlineError::InvalidAudio { .. } => "INVALID_AUDIO",
            TrimlineError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            TrimlineError::StreamClosed => "STREAM_CLOSED",
            TrimlineError::Io(_) => "IO_ERROR",
            TrimlineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the stream untouched, so the caller can fix
    /// its input and retry on the same instance.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrimlineError::InvalidArgument { .. }
                | TrimlineError::IllegalState { .. }
                | TrimlineError::FileNotFound { .. }
                | TrimlineError::UnsupportedFormat { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TrimlineError::IllegalState { .. } => vec![
                "Call set_audio_format before using millisecond-based operations",
                "Open the stream from a file so the format is read from its header",
            ],
            TrimlineError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the recording hasn't been moved or deleted",
            ],
            TrimlineError::InvalidAudio { .. } => vec![
                "The file does not look like a RIFF/WAVE recording",
                "The header may be truncated - try re-exporting from source",
            ],
            TrimlineError::UnsupportedFormat { .. } => vec![
                "Supported encodings: 8/16/24/32-bit PCM, 32-bit float, A-law, mu-law",
            ],
            TrimlineError::StreamClosed => vec!["Clone the stream before closing it"],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = TrimlineError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(TrimlineError::StreamClosed.error_code(), "STREAM_CLOSED");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = TrimlineError::format_not_set();
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
        assert!(!TrimlineError::StreamClosed.is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let err: TrimlineError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "channel closed").into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.to_string().contains("channel closed"));
    }
}
