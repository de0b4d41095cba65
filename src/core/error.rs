// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for bagmap.
//!
//! Every failure surfaced by the container reader, the chunk codecs, the
//! message decoders and the playback session is one of these variants.
//! Each variant has a stable string code (see [`BagMapError::code`]) so a
//! caller across a thread or process boundary can match on it without
//! parsing messages.

use thiserror::Error;

/// Errors that can occur while reading, decoding or mapping a bag file.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BagMapError {
    /// Bad magic, unknown op, malformed field framing
    #[error("Format error in {context}: {message}")]
    Format {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// A declared length runs past the end of the buffer
    #[error("Truncated input: requested {requested} bytes at position {position}, but only {available} bytes available")]
    TruncatedInput {
        /// Requested bytes
        requested: usize,
        /// Available bytes
        available: usize,
        /// Cursor position when the read was attempted
        position: usize,
    },

    /// Chunk compression or codec feature that is not supported
    #[error("Unsupported compression: {feature}")]
    UnsupportedCompression {
        /// Identifier or feature that is not supported
        feature: String,
    },

    /// Literal or match copy would exceed source or destination bounds
    #[error("{codec} overflow: {message}")]
    CodecOverflow {
        /// Codec that detected the overflow
        codec: String,
        /// Error message
        message: String,
    },

    /// Selected topic is absent from the discovered connections
    #[error("Topic not found: '{topic}'")]
    TopicNotFound {
        /// Topic name that was requested
        topic: String,
    },

    /// Selected topic yielded zero messages
    #[error("No messages found on topic '{topic}'")]
    NoMessages {
        /// Topic name that was requested
        topic: String,
    },

    /// Message payload could not be decoded
    #[error("Failed to decode {message_type}: {message}")]
    Decode {
        /// Message type being decoded
        message_type: String,
        /// Error message
        message: String,
    },

    /// Map configuration violates an invariant
    #[error("Invalid config field '{field}': {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Command not valid in the current session state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O failure while opening or writing files
    #[error("I/O error: {0}")]
    Io(String),
}

impl BagMapError {
    /// Create a format error.
    pub fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagMapError::Format {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a truncated input error.
    pub fn truncated(requested: usize, available: usize, position: usize) -> Self {
        BagMapError::TruncatedInput {
            requested,
            available,
            position,
        }
    }

    /// Create an unsupported compression error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        BagMapError::UnsupportedCompression {
            feature: feature.into(),
        }
    }

    /// Create a codec overflow error.
    pub fn overflow(codec: impl Into<String>, message: impl Into<String>) -> Self {
        BagMapError::CodecOverflow {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Create a "topic not found" error.
    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        BagMapError::TopicNotFound {
            topic: topic.into(),
        }
    }

    /// Create a "no messages" error.
    pub fn no_messages(topic: impl Into<String>) -> Self {
        BagMapError::NoMessages {
            topic: topic.into(),
        }
    }

    /// Create a message decode error.
    pub fn decode(message_type: impl Into<String>, message: impl Into<String>) -> Self {
        BagMapError::Decode {
            message_type: message_type.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BagMapError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        BagMapError::InvalidState {
            message: message.into(),
        }
    }

    /// Stable code for this error, suitable for display layers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            BagMapError::Format { .. } => "FORMAT_ERROR",
            BagMapError::TruncatedInput { .. } => "TRUNCATED_INPUT",
            BagMapError::UnsupportedCompression { .. } => "UNSUPPORTED_COMPRESSION",
            BagMapError::CodecOverflow { .. } => "CODEC_OVERFLOW",
            BagMapError::TopicNotFound { .. } => "TOPIC_NOT_FOUND",
            BagMapError::NoMessages { .. } => "NO_MESSAGES",
            BagMapError::Decode { .. } => "DECODE_ERROR",
            BagMapError::InvalidConfig { .. } => "INVALID_CONFIG",
            BagMapError::InvalidState { .. } => "INVALID_STATE",
            BagMapError::Io(_) => "IO_ERROR",
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            BagMapError::Format { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            BagMapError::TruncatedInput {
                requested,
                available,
                position,
            } => vec![
                ("requested", requested.to_string()),
                ("available", available.to_string()),
                ("position", position.to_string()),
            ],
            BagMapError::UnsupportedCompression { feature } => {
                vec![("feature", feature.clone())]
            }
            BagMapError::CodecOverflow { codec, message } => {
                vec![("codec", codec.clone()), ("message", message.clone())]
            }
            BagMapError::TopicNotFound { topic } | BagMapError::NoMessages { topic } => {
                vec![("topic", topic.clone())]
            }
            BagMapError::Decode {
                message_type,
                message,
            } => vec![("type", message_type.clone()), ("message", message.clone())],
            BagMapError::InvalidConfig { field, reason } => {
                vec![("field", field.clone()), ("reason", reason.clone())]
            }
            BagMapError::InvalidState { message } => vec![("message", message.clone())],
            BagMapError::Io(msg) => vec![("message", msg.clone())],
        }
    }
}

impl From<std::io::Error> for BagMapError {
    fn from(err: std::io::Error) -> Self {
        BagMapError::Io(err.to_string())
    }
}

/// Result type for bagmap operations.
pub type Result<T> = std::result::Result<T, BagMapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let err = BagMapError::format("BagReader", "bad op");
        assert!(matches!(err, BagMapError::Format { .. }));
        assert_eq!(err.to_string(), "Format error in BagReader: bad op");
        assert_eq!(err.code(), "FORMAT_ERROR");
    }

    #[test]
    fn test_truncated_error() {
        let err = BagMapError::truncated(100, 50, 10);
        assert_eq!(
            err.to_string(),
            "Truncated input: requested 100 bytes at position 10, but only 50 bytes available"
        );
        assert_eq!(err.code(), "TRUNCATED_INPUT");
    }

    #[test]
    fn test_unsupported_error() {
        let err = BagMapError::unsupported("zstd");
        assert_eq!(err.to_string(), "Unsupported compression: zstd");
        assert_eq!(err.code(), "UNSUPPORTED_COMPRESSION");
    }

    #[test]
    fn test_topic_errors() {
        let err = BagMapError::topic_not_found("/scan");
        assert_eq!(err.to_string(), "Topic not found: '/scan'");
        assert_eq!(err.code(), "TOPIC_NOT_FOUND");

        let err = BagMapError::no_messages("/scan");
        assert_eq!(err.code(), "NO_MESSAGES");
        assert_eq!(err.log_fields(), vec![("topic", "/scan".to_string())]);
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            BagMapError::format("a", "b"),
            BagMapError::truncated(1, 0, 0),
            BagMapError::unsupported("x"),
            BagMapError::overflow("LZ4", "m"),
            BagMapError::topic_not_found("t"),
            BagMapError::no_messages("t"),
            BagMapError::decode("LaserScan", "m"),
            BagMapError::invalid_config("resolution", "must be positive"),
            BagMapError::invalid_state("no file"),
            BagMapError::Io("disk".to_string()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_log_fields_truncated() {
        let fields = BagMapError::truncated(8, 3, 42).log_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("requested", "8".to_string()));
        assert_eq!(fields[1], ("available", "3".to_string()));
        assert_eq!(fields[2], ("position", "42".to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BagMapError = io_err.into();
        assert_eq!(err.code(), "IO_ERROR");
        assert_eq!(err.to_string(), "I/O error: file not found");
    }
}
