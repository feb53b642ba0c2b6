use thiserror::Error;

/**
    Errors shared by every crate in the ecosystem.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An operation that requires an open session was called on a closed one.
    #[error("media writer is not open")]
    NotOpen,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("no suitable encoder: {0}")]
    EncoderNotFound(String),

    #[error("codec error: {0}")]
    Codec(String),

    /// Container, device and allocation failures.
    #[error("i/o error: {0}")]
    Io(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("no converter initialized: {0}")]
    NoConverter(String),
}

impl Error {
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn encoder_not_found(msg: impl Into<String>) -> Self {
        Self::EncoderNotFound(msg.into())
    }

    pub fn no_converter(msg: impl Into<String>) -> Self {
        Self::NoConverter(msg.into())
    }
}

/**
    Result alias using the shared [`Error`] type.
*/
pub type Result<T, E = Error> = std::result::Result<T, E>;

/**
    Error returned by `FromStr` implementations on enum types.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
