//! Connection establishment.
//!
//! [`Connecter`] drives the client through address resolution, route
//! resolution, and connect; [`Listener`] binds the server and accepts one
//! request at a time. Both hand the caller the device context right before
//! the connection is completed, so the queue pair exists (and, on the
//! server, a receive is posted) by the time the peer can send.

mod stage;

#[cfg(rdma_verbs)]
mod connecter;
#[cfg(rdma_verbs)]
mod connection;
#[cfg(rdma_verbs)]
mod listener;

pub use self::stage::CmStage;

#[cfg(rdma_verbs)]
pub use self::{connecter::Connecter, connection::Connection, listener::Listener};
