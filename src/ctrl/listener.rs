use super::connection::{wait_event, Connection};
use super::stage::CmStage;
use crate::error::{Error, Result};
use crate::rdma::cm::{AddrInfo, CmId, EventChannel};
use crate::rdma::context::Context;

/// Server side of connection establishment: a passive endpoint accepting one
/// connection at a time.
pub struct Listener {
    channel: EventChannel,
    id: CmId,
    port: u16,
}

impl Listener {
    /// Bind to `port` on all local addresses and listen with a backlog of 1.
    pub fn bind(port: u16) -> Result<Self> {
        let addr = AddrInfo::resolve(None, port, true)
            .map_err(|e| Error::Accept(format!("cannot resolve local port {}: {}", port, e)))?;
        let channel = EventChannel::new().map_err(Error::alloc("event channel"))?;
        let id = CmId::new(&channel).map_err(Error::alloc("connection manager id"))?;

        id.bind_addr(&addr)
            .map_err(|e| Error::Accept(format!("cannot bind port {}: {}", port, e)))?;
        id.listen(1)
            .map_err(|e| Error::Accept(format!("cannot listen on port {}: {}", port, e)))?;
        log::debug!("listening on port {}", port);

        Ok(Self { channel, id, port })
    }

    /// Get the port listened on.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the listening identifier.
    #[inline]
    pub fn id(&self) -> &CmId {
        &self.id
    }

    /// Block until a connection request arrives, then accept it.
    ///
    /// `prepare` runs on the requesting identifier's context before the
    /// connection is accepted; it must create the queue pair and post the
    /// first receive. Whatever it returns is handed back with the
    /// connection.
    pub fn accept_with<T>(
        &self,
        prepare: impl FnOnce(&Context) -> Result<T>,
    ) -> Result<(Connection, T)> {
        let info = wait_event(&self.channel, CmStage::Request, "listener")?;
        let id = info
            .request
            .ok_or_else(|| Error::Accept("connect request without an identifier".to_owned()))?;

        let ctx = Context::of(&id).map_err(Error::alloc("device context"))?;
        let peer = format!("client on {} port {}", ctx.name(), self.port);
        let prepared = prepare(&ctx)?;

        id.accept()
            .map_err(|e| CmStage::Accept.failed(&peer, e))?;
        wait_event(&self.channel, CmStage::Accept, &peer)?;
        log::info!("accepted {}", peer);

        Ok((Connection::new(id, ctx, peer), prepared))
    }
}
