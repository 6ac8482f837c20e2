//! Error types for oxilzma operations.
//!
//! Every failure the codec can report is a variant of [`LzmaError`]. LZMA
//! streams are not self-synchronizing, so all of these are terminal: once a
//! stream is found to be corrupt, nothing after that point can be trusted.

use std::io;
use thiserror::Error;

/// Largest dictionary size a stream header may request.
///
/// Anything above this is treated as a hostile or corrupt header rather than
/// a reason to allocate that much memory.
pub const DICT_SIZE_LIMIT: u32 = 100_000_000;

/// The main error type for oxilzma operations.
#[derive(Debug, Error)]
pub enum LzmaError {
    /// I/O error from the underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream header is malformed.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// The header asks for a dictionary larger than we are willing to allocate.
    #[error("Unsupported dictionary size: {size} bytes (limit {max})")]
    UnsupportedDictionarySize {
        /// Requested dictionary size.
        size: u32,
        /// Largest accepted dictionary size.
        max: u32,
    },

    /// The input ended before the stream did.
    #[error("Truncated input: unexpected end of data at offset {offset}")]
    TruncatedInput {
        /// Byte offset (from the start of the stream) where input ran out.
        offset: u64,
    },

    /// The coded body decodes to something impossible.
    #[error("Corrupt stream at offset {offset}: {message}")]
    CorruptStream {
        /// Compressed byte offset (from the start of the stream, header
        /// included) at which the corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Decompressed data requested as text is not valid UTF-8.
    #[error("Invalid UTF-8: {message}")]
    InvalidUtf8 {
        /// Description of the encoding error.
        message: String,
    },
}

/// Result type alias for oxilzma operations.
pub type Result<T> = std::result::Result<T, LzmaError>;

impl LzmaError {
    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unsupported dictionary size error.
    pub fn unsupported_dict_size(size: u32) -> Self {
        Self::UnsupportedDictionarySize {
            size,
            max: DICT_SIZE_LIMIT,
        }
    }

    /// Create a truncated input error.
    pub fn truncated(offset: u64) -> Self {
        Self::TruncatedInput { offset }
    }

    /// Create a corrupt stream error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptStream {
            offset,
            message: message.into(),
        }
    }

    /// Move a [`CorruptStream`](Self::CorruptStream) error to compressed
    /// offset `offset`; other errors are returned unchanged.
    pub fn at_offset(self, offset: u64) -> Self {
        match self {
            Self::CorruptStream { message, .. } => Self::CorruptStream { offset, message },
            other => other,
        }
    }

    /// Create an invalid UTF-8 error.
    pub fn invalid_utf8(message: impl Into<String>) -> Self {
        Self::InvalidUtf8 {
            message: message.into(),
        }
    }

    /// Whether this error means the data itself is bad (as opposed to I/O).
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader { .. }
                | Self::UnsupportedDictionarySize { .. }
                | Self::TruncatedInput { .. }
                | Self::CorruptStream { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LzmaError::invalid_header("properties byte 0xE1");
        assert!(err.to_string().contains("Invalid header"));

        let err = LzmaError::unsupported_dict_size(0xFFFF_FFFF);
        assert!(err.to_string().contains("4294967295"));

        let err = LzmaError::corrupted(42, "distance out of range");
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("distance out of range"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: LzmaError = io_err.into();
        assert!(matches!(err, LzmaError::Io(_)));
        assert!(!err.is_data_error());
    }

    #[test]
    fn test_data_errors() {
        assert!(LzmaError::truncated(13).is_data_error());
        assert!(LzmaError::corrupted(0, "x").is_data_error());
        assert!(!LzmaError::invalid_utf8("x").is_data_error());
    }

    #[test]
    fn test_at_offset() {
        let err = LzmaError::corrupted(7, "bad distance").at_offset(120);
        assert!(matches!(
            err,
            LzmaError::CorruptStream { offset: 120, ref message } if message == "bad distance"
        ));

        let err = LzmaError::truncated(13).at_offset(120);
        assert!(matches!(err, LzmaError::TruncatedInput { offset: 13 }));
    }
}
