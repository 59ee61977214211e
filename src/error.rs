//! Error taxonomy of a transfer.
//!
//! Every error is fatal to the session it occurs in: nothing is retried, and
//! the front end receives the error kind together with the byte count the
//! session reached (see [`SessionError`]).

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::rdma::status::WcStatus;
use crate::xfer::TransferState;

/// Result type of this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort a transfer.
#[derive(Debug, Error)]
pub enum Error {
    /// The server address could not be resolved.
    #[error("cannot resolve address {addr}: {reason}")]
    AddressResolution { addr: String, reason: String },

    /// No route to the resolved address within the timeout.
    #[error("cannot resolve route: {0}")]
    RouteResolution(String),

    /// The peer rejected the connection, or waiting for it failed.
    #[error("connection rejected: {0}")]
    ConnectRejected(String),

    /// Binding, listening, or accepting on the passive side failed.
    #[error("cannot accept connection: {0}")]
    Accept(String),

    /// A verbs or connection manager resource could not be created.
    #[error("cannot allocate {what}: {source}")]
    ResourceAllocation {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// A send completed with a non-success status.
    #[error("send failed: {0}")]
    SendFailed(WcStatus),

    /// A receive completed with a non-success status.
    #[error("receive failed: {0}")]
    ReceiveFailed(WcStatus),

    /// The peer violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The source file ended before the declared length was sent.
    #[error("short read: source ended after {sent} of {declared} bytes")]
    ShortRead { sent: u64, declared: u64 },

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device refused a work request.
    #[error("cannot post {op} request: {source}")]
    Post {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Polling the completion queue for a request failed.
    #[error("cannot poll completion queue for {op} request: {source}")]
    Poll {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The transfer was stopped by a termination request.
    #[error("interrupted")]
    Interrupted,

    /// The configuration is invalid or unreadable.
    #[error("bad configuration: {0}")]
    Config(String),
}

/// Machine-readable error category, reported to front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AddressResolution,
    RouteResolution,
    ConnectRejected,
    Accept,
    ResourceAllocation,
    SendFailed,
    ReceiveFailed,
    Protocol,
    ShortRead,
    Io,
    Config,
    Interrupted,
}

impl Error {
    /// Get the category of this error.
    ///
    /// Post and poll failures are transport faults of the same direction as
    /// a failed completion, so they are reported as such.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressResolution { .. } => ErrorKind::AddressResolution,
            Error::RouteResolution(_) => ErrorKind::RouteResolution,
            Error::ConnectRejected(_) => ErrorKind::ConnectRejected,
            Error::Accept(_) => ErrorKind::Accept,
            Error::ResourceAllocation { .. } => ErrorKind::ResourceAllocation,
            Error::SendFailed(_)
            | Error::Post { op: "send", .. }
            | Error::Poll { op: "send", .. } => ErrorKind::SendFailed,
            Error::ReceiveFailed(_) | Error::Post { .. } | Error::Poll { .. } => {
                ErrorKind::ReceiveFailed
            }
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::ShortRead { .. } => ErrorKind::ShortRead,
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Shorthand for a resource allocation failure.
    #[cfg(rdma_verbs)]
    pub(crate) fn alloc(what: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::ResourceAllocation { what, source }
    }
}

/// A fatal error together with how far the session got.
#[derive(Debug, Error)]
#[error("{source} ({bytes_transferred} bytes transferred, failed while {state})")]
pub struct SessionError {
    /// The error that aborted the session.
    #[source]
    pub source: Error,

    /// Payload bytes transferred before the fault.
    pub bytes_transferred: u64,

    /// The state the session was in when it failed.
    pub state: TransferState,
}

impl SessionError {
    /// Get the category of the underlying error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            Error::SendFailed(WcStatus::RetryExcErr).kind(),
            ErrorKind::SendFailed
        );
        assert_eq!(
            Error::Post {
                op: "send",
                source: io::Error::from_raw_os_error(libc::ENOMEM)
            }
            .kind(),
            ErrorKind::SendFailed
        );
        assert_eq!(
            Error::Post {
                op: "receive",
                source: io::Error::from_raw_os_error(libc::ENOMEM)
            }
            .kind(),
            ErrorKind::ReceiveFailed
        );
        assert_eq!(
            Error::Poll {
                op: "send",
                source: io::Error::from_raw_os_error(libc::EIO)
            }
            .kind(),
            ErrorKind::SendFailed
        );
        assert_eq!(
            Error::Poll {
                op: "receive",
                source: io::Error::from_raw_os_error(libc::EIO)
            }
            .kind(),
            ErrorKind::ReceiveFailed
        );
        assert_eq!(Error::Interrupted.kind(), ErrorKind::Interrupted);
        assert_eq!(
            Error::from(io::Error::new(io::ErrorKind::Other, "disk full")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn messages_carry_details() {
        let e = Error::ShortRead {
            sent: 10,
            declared: 20,
        };
        assert_eq!(e.to_string(), "short read: source ended after 10 of 20 bytes");

        let e = Error::ResourceAllocation {
            what: "protection domain",
            source: io::Error::from_raw_os_error(libc::ENOMEM),
        };
        assert!(e.to_string().starts_with("cannot allocate protection domain: "));
        assert_eq!(
            serde_json::to_string(&e.kind()).unwrap(),
            "\"resource_allocation\""
        );
    }

    #[test]
    fn session_error_reports_progress() {
        let e = SessionError {
            source: Error::ReceiveFailed(WcStatus::WrFlushErr),
            bytes_transferred: 4096,
            state: TransferState::Streaming,
        };
        assert_eq!(e.kind(), ErrorKind::ReceiveFailed);
        assert_eq!(
            e.to_string(),
            "receive failed: WR flush error (4096 bytes transferred, failed while streaming)"
        );
    }
}
