use std::num::{ParseFloatError, ParseIntError};
use std::str::Utf8Error;

use thiserror::Error;

/// Errors produced by the tokenizer layer.
///
/// [`Parser::run`][crate::Parser::run] and [`Generator::run`][crate::Generator::run]
/// do not surface these directly; they fold every failure into the
/// tri-state [`StreamResult`][crate::StreamResult]. The detailed variants
/// exist for the tokenizers and their tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The output buffer did not have enough space to hold the data we
    /// attempted to write. The stream cursor is left at the end of the
    /// buffer.
    #[error("output buffer overflow")]
    OutputOverflow,

    /// Ran out of input before a token terminator was found. The stream
    /// cursor is left at the end of the buffer.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// Malformed start line.
    #[error("invalid start line")]
    StartLine,

    /// Unrecognized protocol version token.
    #[error("invalid protocol version")]
    Version,

    /// Request id is not a decimal number.
    #[error("invalid request id")]
    RequestId,

    /// Status code is not a decimal number.
    #[error("invalid status code")]
    StatusCode,

    /// Unrecognized request state token.
    #[error("invalid request state")]
    RequestState,

    /// Malformed channel identifier line.
    #[error("invalid channel identifier")]
    ChannelId,

    /// Invalid byte in header name.
    #[error("invalid header name")]
    HeaderName,

    /// Invalid byte in header value.
    #[error("invalid header value")]
    HeaderValue,

    /// Invalid byte in new line.
    #[error("invalid new line")]
    NewLine,

    /// Invalid byte where a token is required.
    #[error("invalid token")]
    Token,

    /// Parsed more headers than the header section allows.
    #[error("too many headers")]
    TooManyHeaders,

    /// `Content-Length` value is not a valid length.
    #[error("invalid content length")]
    ContentLength,

    /// The channel identifier names a resource the factory does not know.
    #[error("unknown resource name")]
    UnknownResource,

    /// The method name is not defined for the resolved resource.
    #[error("method not defined for resource")]
    UnknownMethod,

    /// The event name is not defined for the resolved resource.
    #[error("event not defined for resource")]
    UnknownEvent,

    /// A message was handed to the generator before its method or event
    /// id could be resolved.
    #[error("method or event id is not resolved")]
    NotResolved,

    /// A message without a resource name cannot be resolved.
    #[error("missing resource name")]
    MissingResourceName,

    /// The `Content-Length` header disagrees with the body length.
    #[error("content-length does not match body length")]
    ContentLengthMismatch,

    /// A header the resolved method requires is not filled.
    #[error("missing required header")]
    MissingRequiredHeader,

    /// Failed to read bytes as `&str`.
    #[error("failed to convert bytes to str")]
    ConvertBytesToStr,

    /// Failed to parse an integer header value.
    #[error("failed to parse integer")]
    ParseInt,

    /// Failed to parse a numeric header value.
    #[error("failed to parse number")]
    ParseFloat,
}

pub(crate) const OVERFLOW: Result<()> = Err(Error::OutputOverflow);

/// Alias for results with the crate error type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Self {
        Error::ConvertBytesToStr
    }
}

impl From<ParseIntError> for Error {
    fn from(_: ParseIntError) -> Self {
        Error::ParseInt
    }
}

impl From<ParseFloatError> for Error {
    fn from(_: ParseFloatError) -> Self {
        Error::ParseFloat
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        match value {
            httparse::Error::HeaderName => Error::HeaderName,
            httparse::Error::HeaderValue => Error::HeaderValue,
            httparse::Error::NewLine => Error::NewLine,
            httparse::Error::Status => Error::StartLine,
            httparse::Error::Token => Error::Token,
            httparse::Error::TooManyHeaders => Error::TooManyHeaders,
            httparse::Error::Version => Error::Version,
        }
    }
}
