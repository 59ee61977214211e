//! Point-to-point transfer of a single file over a reliable RDMA connection.
//!
//! The crate is layered the same way a transfer runs:
//!
//! - [`ctrl`] establishes the connection through the RDMA connection manager
//!   ([`ctrl::Connecter`] on the client, [`ctrl::Listener`] on the server).
//! - [`channel`] provides synchronous send and receive primitives over one
//!   registered buffer ([`channel::TransferChannel`]), busy-polling the
//!   completion queue for every request.
//! - [`xfer`] runs the wire protocol: an 8-byte big-endian length header,
//!   then raw data messages of at most the buffer capacity.
//!
//! [`role::Initiator`] and [`role::Responder`] wire the three together.
//!
//! RDMA resource holders ([`rdma::pd::Pd`], [`rdma::cq::Cq`],
//! [`rdma::mr::Mr`], [`rdma::qp::Qp`]) are `Arc`-based and keep the
//! resources they depend on alive, so teardown always happens in reverse
//! order of creation, however the values are dropped.
//!
//! Waits for completions and connection events give up once a
//! [`stop::StopFlag`] is raised, which the binary wires to `SIGINT` and
//! `SIGTERM`; the transfer then fails and its resources are released in the
//! same order.
//!
//! The RDMA backend is built only when `libibverbs` and `librdmacm` are
//! found at build time. The protocol layer does not depend on it and can run
//! over the in-process [`channel::LoopbackChannel`]:
//!
//! ```rust
//! use rdma_xfer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut tx, mut rx) = LoopbackChannel::pair(4096);
//!     let content = vec![42u8; 10_000];
//!
//!     let mut events: Vec<StatusEvent> = Vec::new();
//!     let mut sender = TransferSession::new(Role::Initiator, &mut events);
//!     sender.connecting("loopback")?;
//!     sender.connected("loopback")?;
//!     let res = xfer::send(&mut tx, &mut sender, &mut &content[..], content.len() as u64);
//!     sender.finish(res)?;
//!
//!     let mut events: Vec<StatusEvent> = Vec::new();
//!     let mut receiver = TransferSession::new(Role::Responder, &mut events);
//!     receiver.connecting("loopback")?;
//!     receiver.connected("loopback")?;
//!     let mut output = Vec::new();
//!     let res = xfer::receive(&mut rx, &mut receiver, &mut output);
//!     let report = receiver.finish(res)?;
//!
//!     assert_eq!(output, content);
//!     assert_eq!(report.data_messages, 3);
//!     Ok(())
//! }
//! ```

#[cfg(rdma_verbs)]
mod bindings;
#[cfg(rdma_verbs)]
#[macro_use]
mod utils;

pub mod channel;
pub mod config;
pub mod ctrl;
pub mod error;
pub mod prelude;
pub mod rdma;
#[cfg(rdma_verbs)]
pub mod role;
pub mod sink;
pub mod stop;
pub mod xfer;

pub use config::Config;
pub use error::{Error, ErrorKind, Result, SessionError};
