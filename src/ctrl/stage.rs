use std::fmt;
use std::io;

use crate::error::Error;
use crate::rdma::cm::CmEventKind;

/// A step of connection establishment that waits for one connection manager
/// event.
///
/// Each stage knows the event that lets it proceed and the error any other
/// outcome maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmStage {
    /// Client: resolving the server address.
    AddrResolve,
    /// Client: resolving the route to the server.
    RouteResolve,
    /// Client: waiting for the server to accept.
    Connect,
    /// Server: waiting for a connection request.
    Request,
    /// Server: waiting for the accepted connection to be established.
    Accept,
}

impl CmStage {
    /// The event that completes this stage.
    pub fn expected(self) -> CmEventKind {
        match self {
            CmStage::AddrResolve => CmEventKind::AddrResolved,
            CmStage::RouteResolve => CmEventKind::RouteResolved,
            CmStage::Connect | CmStage::Accept => CmEventKind::Established,
            CmStage::Request => CmEventKind::ConnectRequest,
        }
    }

    /// Check an event observed during this stage.
    ///
    /// Negative statuses are `errno` values; others are transport-specific
    /// codes such as reject reasons.
    pub fn check(self, kind: CmEventKind, status: i32, target: &str) -> Result<(), Error> {
        if kind == self.expected() && status == 0 {
            return Ok(());
        }
        let reason = match status {
            0 => kind.to_string(),
            s if s < 0 => format!("{}: {}", kind, io::Error::from_raw_os_error(-s)),
            s => format!("{} with status {}", kind, s),
        };
        Err(self.error(target, reason))
    }

    /// Map a failure to issue or wait for this stage's operation.
    pub fn failed(self, target: &str, err: io::Error) -> Error {
        self.error(target, err.to_string())
    }

    fn error(self, target: &str, reason: String) -> Error {
        match self {
            CmStage::AddrResolve => Error::AddressResolution {
                addr: target.to_owned(),
                reason,
            },
            CmStage::RouteResolve => Error::RouteResolution(format!("to {}: {}", target, reason)),
            CmStage::Connect => Error::ConnectRejected(format!("by {}: {}", target, reason)),
            CmStage::Request | CmStage::Accept => Error::Accept(reason),
        }
    }
}

impl fmt::Display for CmStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmStage::AddrResolve => "address resolution",
            CmStage::RouteResolve => "route resolution",
            CmStage::Connect => "connect",
            CmStage::Request => "connect request",
            CmStage::Accept => "accept",
        })
    }
}
