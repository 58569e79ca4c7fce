//! Error types for ohttpd.
//!
//! Protocol failures are not errors here: a bad request or a missing file is
//! an [`Outcome`](crate::outcome::Outcome) that still produces a response.
//! `HttpdError` covers the things that end a connection (or refuse to start
//! the server) without anything being sent.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpdError {
    /// OS error with errno.
    Os(i32),
    /// Worker pool is shut down or its queue is full.
    WorkerUnavailable,
    /// Response head did not fit in the write buffer.
    WriteBufferFull,
    /// Asked to build a response for an outcome that is not terminal.
    NotTerminal,
    /// Descriptor does not fit in the connection table.
    TableFull(i32),
    /// Configuration rejected by `validate()`.
    InvalidConfig(&'static str),
}

impl fmt::Display for HttpdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os(e) => write!(f, "OS error: errno {}", e),
            Self::WorkerUnavailable => write!(f, "worker pool unavailable"),
            Self::WriteBufferFull => write!(f, "write buffer full"),
            Self::NotTerminal => write!(f, "outcome is not terminal"),
            Self::TableFull(fd) => write!(f, "fd {} exceeds connection table", fd),
            Self::InvalidConfig(why) => write!(f, "invalid config: {}", why),
        }
    }
}

impl std::error::Error for HttpdError {}

impl From<std::io::Error> for HttpdError {
    fn from(e: std::io::Error) -> Self {
        HttpdError::Os(e.raw_os_error().unwrap_or(0))
    }
}

pub type Result<T> = std::result::Result<T, HttpdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(HttpdError::Os(11).to_string(), "OS error: errno 11");
        assert_eq!(HttpdError::TableFull(70000).to_string(), "fd 70000 exceeds connection table");
        assert_eq!(
            HttpdError::InvalidConfig("workers must be at least 1").to_string(),
            "invalid config: workers must be at least 1"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::from_raw_os_error(32);
        assert_eq!(HttpdError::from(io), HttpdError::Os(32));
    }
}
