// ABOUTME: Error types for BSON encoding and decoding.
// ABOUTME: Variants are grouped into format, usage, conversion and I/O kinds.

use crate::token::TokenType;
use std::fmt;

/// The result type for BSON operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed byte layout. Fatal to the decoder.
    Format,
    /// API misuse, reported at the call site.
    Usage,
    /// A typed accessor could not coerce the current value. The decoder
    /// remains usable.
    Conversion,
    /// The underlying byte source or sink failed.
    Io,
}

/// Errors that can occur during BSON encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The byte source ended inside a document.
    #[error("unexpected end of stream at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// A tag byte outside the supported element types.
    #[error("unknown element type 0x{tag:02x} at offset {offset}")]
    UnknownElementType { tag: u8, offset: u64 },

    /// A length field that is negative, too small, or reaches past its
    /// enclosing frame.
    #[error("invalid {what} length {length} at offset {offset}")]
    InvalidLength {
        what: &'static str,
        length: i64,
        offset: u64,
    },

    /// The frame terminator was not where the frame's length placed it.
    /// `actual` is the offset at which the disagreement was detected.
    #[error("frame declared to end at offset {declared}, terminator mismatch at offset {actual}")]
    FrameLengthMismatch { declared: u64, actual: u64 },

    /// Invalid UTF-8 in a name or string value.
    #[error("invalid UTF-8 sequence at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    /// Any other malformed payload.
    #[error("malformed {what} at offset {offset}")]
    Malformed { what: &'static str, offset: u64 },

    /// The decoder already failed with a format error.
    #[error("decoder is unusable after an earlier format error")]
    Poisoned,

    /// BSON has no representation for this kind of token.
    #[error("{0} tokens are not supported by BSON")]
    UnsupportedToken(TokenType),

    /// A value was written before any root object or array was started.
    #[error("a root object or array must be started before writing {0}")]
    NoRootContainer(&'static str),

    /// Writer calls arrived in an order that cannot produce a document.
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// A value cannot be represented in BSON.
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    /// A name or regex part contains a NUL byte and cannot be a CString.
    #[error("{0:?} contains a NUL byte and cannot be written as a CString")]
    NulInCString(String),

    /// A typed read could not coerce the current value.
    #[error("{message}. Path '{path}'")]
    Conversion { message: String, path: String },

    /// Bytes remained after the expected document.
    #[error("trailing bytes after document")]
    TrailingBytes,

    /// The encoder was closed.
    #[error("the encoder has been closed")]
    Closed,

    /// I/O error from the byte source or sink.
    #[error("I/O error: {0}")]
    Io(String),

    /// Custom error message (for serde integration).
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedEof { .. }
            | Error::UnknownElementType { .. }
            | Error::InvalidLength { .. }
            | Error::FrameLengthMismatch { .. }
            | Error::InvalidUtf8 { .. }
            | Error::Malformed { .. }
            | Error::Poisoned
            | Error::TrailingBytes => ErrorKind::Format,
            Error::UnsupportedToken(_)
            | Error::NoRootContainer(_)
            | Error::InvalidWrite(_)
            | Error::ValueOutOfRange(_)
            | Error::NulInCString(_)
            | Error::Closed => ErrorKind::Usage,
            Error::Conversion { .. } | Error::Custom(_) => ErrorKind::Conversion,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns a stable snake_case name for this error.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::UnexpectedEof { .. } => "unexpected_eof",
            Error::UnknownElementType { .. } => "unknown_element_type",
            Error::InvalidLength { .. } => "invalid_length",
            Error::FrameLengthMismatch { .. } => "frame_length_mismatch",
            Error::InvalidUtf8 { .. } => "invalid_utf8",
            Error::Malformed { .. } => "malformed",
            Error::Poisoned => "poisoned",
            Error::UnsupportedToken(_) => "unsupported_token",
            Error::NoRootContainer(_) => "no_root_container",
            Error::InvalidWrite(_) => "invalid_write",
            Error::ValueOutOfRange(_) => "value_out_of_range",
            Error::NulInCString(_) => "nul_in_cstring",
            Error::Conversion { .. } => "conversion",
            Error::TrailingBytes => "trailing_bytes",
            Error::Closed => "closed",
            Error::Io(_) => "io_error",
            Error::Custom(_) => "custom",
        }
    }

    pub(crate) fn conversion(message: impl Into<String>, path: impl Into<String>) -> Self {
        Error::Conversion {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
