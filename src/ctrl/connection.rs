use std::io;

use super::stage::CmStage;
use crate::error::{Error, Result};
use crate::rdma::cm::{CmEventInfo, CmId, EventChannel};
use crate::rdma::context::Context;
use crate::stop::StopFlag;

/// Wait for the event that completes `stage` on `channel`.
///
/// The event is acknowledged before it is inspected. A failed
/// acknowledgement leaks channel resources and is fatal. A termination
/// signal interrupts the wait.
pub(crate) fn wait_event(channel: &EventChannel, stage: CmStage, target: &str) -> Result<CmEventInfo> {
    let stop = StopFlag::process();
    stop.check()?;
    let event = channel.get_event().map_err(|e| {
        if stop.is_raised() {
            Error::Interrupted
        } else {
            stage.failed(target, e)
        }
    })?;
    let info = event
        .ack()
        .map_err(Error::alloc("connection manager event acknowledgement"))?;
    log::debug!("{}: got {} (status {})", stage, info.kind, info.status);
    stage.check(info.kind, info.status, target)?;
    Ok(info)
}

/// An established reliable connection.
///
/// Verbs resources created on [`context`](Self::context) keep the underlying
/// identifier alive, so they may outlive this value; the identifier and its
/// event channel are destroyed after the last of them.
pub struct Connection {
    id: CmId,
    ctx: Context,
    peer: String,
}

impl Connection {
    pub(crate) fn new(id: CmId, ctx: Context, peer: String) -> Self {
        Self { id, ctx, peer }
    }

    /// Get the device context of the connection.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Get the connection manager identifier.
    #[inline]
    pub fn id(&self) -> &CmId {
        &self.id
    }

    /// Get a description of the remote side.
    #[inline]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Disconnect from the peer.
    pub fn disconnect(&self) -> io::Result<()> {
        log::debug!("disconnecting from {}", self.peer);
        self.id.disconnect()
    }
}
