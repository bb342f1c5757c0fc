//! Errors surfaced by sessions, filter chains and the transports that drive them.

use std::{io, time::Duration};

/// Every failure a session or filter chain can report.
///
/// Each variant is delivered at most once per session through
/// [`IoHandler::on_exception`](crate::IoHandler::on_exception), and is always
/// followed by the session closing. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server could not bind its listening address. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener was asked to bind.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The connection was not established within the configured timeout.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Remote address of the attempt.
        addr: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The connection attempt failed outright.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Remote address of the attempt.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A filter rejected inbound data.
    #[error("decode failed in {filter}: {reason}")]
    Decode {
        /// Name of the filter that failed.
        filter: String,
        /// What was wrong with the input.
        reason: String,
    },

    /// A filter rejected an outbound object.
    #[error("encode failed in {filter}: {reason}")]
    Encode {
        /// Name of the filter that failed.
        filter: String,
        /// What was wrong with the object.
        reason: String,
    },

    /// The session is not open.
    #[error("session {0} is closed")]
    SessionClosed(u64),

    /// Read, write or shutdown failure on an established connection.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// No filter with the given name is in the chain.
    #[error("no such filter \"{0}\" in filter chain")]
    FilterNotFound(String),
}

impl Error {
    /// Builds a [`Error::Decode`] for `filter`.
    pub fn decode(filter: impl Into<String>, reason: impl ToString) -> Self {
        Error::Decode {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a [`Error::Encode`] for `filter`.
    pub fn encode(filter: impl Into<String>, reason: impl ToString) -> Self {
        Error::Encode {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }

    /// Builds a [`Error::ConnectTimeout`] for `addr`.
    pub fn connect_timeout(addr: impl ToString, timeout: Duration) -> Self {
        Error::ConnectTimeout {
            addr: addr.to_string(),
            timeout,
        }
    }

    /// Builds a [`Error::Bind`] for `addr`.
    pub fn bind(addr: impl ToString, source: io::Error) -> Self {
        Error::Bind {
            addr: addr.to_string(),
            source,
        }
    }

    /// Builds a [`Error::Connect`] for `addr`.
    pub fn connect(addr: impl ToString, source: io::Error) -> Self {
        Error::Connect {
            addr: addr.to_string(),
            source,
        }
    }

    /// True for the codec failures raised by a filter.
    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::Encode { .. })
    }
}
