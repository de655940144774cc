use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Reqwest(reqwest::Error),
    Http(StatusCode, String),
    Auth(String),
    Refresh(RefreshError),
    Config(String),
    InvalidHeader(String),
}

/// Outcome of a failed refresh cycle, shared by the whole waiter cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    MissingRefreshToken,
    Rejected { status: StatusCode, body: String },
    Malformed(String),
    Transport(String),
    WaitTimeout(Duration),
    Abandoned,
}

impl Error {
    /// True when the caller should abandon the operation instead of retrying locally.
    pub fn is_terminal_auth(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Refresh(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http(status, _) => Some(*status),
            Error::Auth(_) => Some(StatusCode::UNAUTHORIZED),
            Error::Reqwest(err) => err.status(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Reqwest(err) => write!(f, "http transport error: {err}"),
            Error::Http(status, body) => write!(f, "request failed with {status}: {body}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Refresh(err) => write!(f, "credential refresh failed: {err}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::InvalidHeader(msg) => write!(f, "invalid header value: {msg}"),
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::MissingRefreshToken => write!(f, "no refresh token stored"),
            RefreshError::Rejected { status, body } => {
                write!(f, "refresh endpoint returned {status}: {body}")
            }
            RefreshError::Malformed(msg) => write!(f, "malformed refresh response: {msg}"),
            RefreshError::Transport(msg) => write!(f, "refresh exchange failed: {msg}"),
            RefreshError::WaitTimeout(after) => {
                write!(f, "gave up waiting for refresh after {}ms", after.as_millis())
            }
            RefreshError::Abandoned => write!(f, "refresh cycle was abandoned before completing"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Reqwest(err) => Some(err),
            Error::Refresh(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for RefreshError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Reqwest(err)
    }
}

impl From<RefreshError> for Error {
    fn from(err: RefreshError) -> Self {
        Error::Refresh(err)
    }
}
