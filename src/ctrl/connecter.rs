use std::time::Duration;

use super::connection::{wait_event, Connection};
use super::stage::CmStage;
use crate::error::{Error, Result};
use crate::rdma::cm::{AddrInfo, CmId, EventChannel};
use crate::rdma::context::Context;

/// Client side of connection establishment.
pub struct Connecter {
    /// Timeout of address and route resolution.
    timeout_ms: i32,
}

impl Connecter {
    /// Create a connecter that resolves addresses and routes within
    /// `timeout` each.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis().min(i32::MAX as u128) as i32,
        }
    }

    /// Connect to `server` on `port`.
    ///
    /// `prepare` runs once the route is resolved and before the connect
    /// request is issued; it must create the queue pair on the context's
    /// identifier. Whatever it returns is handed back with the connection.
    pub fn connect<T>(
        &self,
        server: &str,
        port: u16,
        prepare: impl FnOnce(&Context) -> Result<T>,
    ) -> Result<(Connection, T)> {
        let target = format!("{}:{}", server, port);

        let addr = AddrInfo::resolve(Some(server), port, false)
            .map_err(|e| CmStage::AddrResolve.failed(&target, e))?;
        let channel = EventChannel::new().map_err(Error::alloc("event channel"))?;
        let id = CmId::new(&channel).map_err(Error::alloc("connection manager id"))?;

        id.resolve_addr(&addr, self.timeout_ms)
            .map_err(|e| CmStage::AddrResolve.failed(&target, e))?;
        wait_event(&channel, CmStage::AddrResolve, &target)?;
        id.resolve_route(self.timeout_ms)
            .map_err(|e| CmStage::RouteResolve.failed(&target, e))?;
        wait_event(&channel, CmStage::RouteResolve, &target)?;
        log::debug!("route to {} resolved", target);

        let ctx = Context::of(&id).map_err(Error::alloc("device context"))?;
        let prepared = prepare(&ctx)?;

        id.connect()
            .map_err(|e| CmStage::Connect.failed(&target, e))?;
        wait_event(&channel, CmStage::Connect, &target)?;
        log::info!("connected to {} via {}", target, ctx.name());

        Ok((Connection::new(id, ctx, target), prepared))
    }
}
