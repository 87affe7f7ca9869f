use crate::sdk::SdkError;

use std::fmt::{self, Display};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    InvalidRelayUrl(String),
    ChannelClosed,
    Sdk(SdkError),
    Io(std::io::Error),
    Url(url::ParseError),
    InternalError(String),
    SerdeJsonError(serde_json::Error),
    TimeError(time::error::Format),
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::InternalError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::InternalError(e)
    }
}

impl From<SdkError> for Error {
    fn from(e: SdkError) -> Self {
        Error::Sdk(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Url(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerdeJsonError(e)
    }
}

impl From<time::error::Format> for Error {
    fn from(e: time::error::Format) -> Self {
        Error::TimeError(e)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::ChannelClosed
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRelayUrl(url) => write!(f, "invalid relay url: {url}"),
            Error::ChannelClosed => write!(f, "wallet app task is not running"),
            Error::Sdk(e) => write!(f, "sdk error: {e}"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Url(e) => write!(f, "url error: {e}"),
            Error::InternalError(e) => write!(f, "{e}"),
            Error::SerdeJsonError(e) => write!(f, "json error: {e}"),
            Error::TimeError(e) => write!(f, "time format error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
