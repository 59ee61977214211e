//! The transfer prelude.
//!
//! The purpose of this module is to alleviate imports of common transfer
//! functionalities.

pub use crate::channel::{Channel, LoopbackChannel, Received};
pub use crate::config::Config;
pub use crate::error::{Error, ErrorKind, SessionError};
pub use crate::sink::{JsonSink, LogSink, StatusEvent, StatusSink};
pub use crate::stop::StopFlag;
pub use crate::xfer::{self, Role, TransferReport, TransferSession, TransferState};

#[cfg(rdma_verbs)]
pub use crate::channel::TransferChannel;
#[cfg(rdma_verbs)]
pub use crate::ctrl::{Connecter, Connection, Listener};
#[cfg(rdma_verbs)]
pub use crate::role::{Initiator, Responder};
