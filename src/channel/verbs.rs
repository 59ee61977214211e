use std::io;

use super::{check_send_range, Channel, Received};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::rdma::context::Context;
use crate::rdma::cq::{Cq, Wc};
use crate::rdma::mr::{Mr, Permission};
use crate::rdma::pd::Pd;
use crate::rdma::qp::{Qp, QpCaps};
use crate::stop::StopFlag;
use crate::xfer::Role;

const SEND_WR_ID: u64 = 1;
const RECV_WR_ID: u64 = 2;

/// Channel over an RC queue pair and one registered buffer.
///
/// Completions are busy-polled: every call returns only after the
/// completion of its own request is observed.
pub struct TransferChannel {
    // Dropped in declaration order: deregister, destroy the QP, then release
    // the CQ and PD.
    mr: Mr,
    qp: Qp,
    cq: Cq,
    _pd: Pd,

    recv_posted: bool,

    /// A completion polled while waiting for the other direction.
    stashed: Option<Wc>,

    /// Raised by termination signals.
    stop: StopFlag,
}

impl TransferChannel {
    /// Create the channel's resources on the context of a connection that is
    /// not yet established.
    ///
    /// The responder also grants remote write on the buffer, although no
    /// remote write is ever issued. Resources created before a failing step
    /// are released before the error is returned.
    pub fn create(ctx: &Context, config: &Config, role: Role) -> Result<Self> {
        config.validate()?;

        let pd = Pd::new(ctx).map_err(Error::alloc("protection domain"))?;
        let cq = Cq::new(ctx, config.cq_depth).map_err(Error::alloc("completion queue"))?;
        let caps = QpCaps {
            max_send_wr: config.max_send_wr,
            max_recv_wr: config.max_recv_wr,
            ..QpCaps::default()
        };
        let qp = Qp::new(ctx.cm(), &pd, &cq, caps).map_err(Error::alloc("queue pair"))?;

        let perm = match role {
            Role::Initiator => Permission::LOCAL_WRITE,
            Role::Responder => Permission::LOCAL_WRITE | Permission::REMOTE_WRITE,
        };
        let mr = Mr::alloc(&pd, config.buffer_capacity, perm)
            .map_err(Error::alloc("memory region"))?;

        log::debug!(
            "{} channel ready on {}: QP {}, {}-byte buffer",
            role,
            ctx.name(),
            qp.qp_num(),
            mr.len()
        );
        Ok(Self {
            mr,
            qp,
            cq,
            _pd: pd,
            recv_posted: false,
            stashed: None,
            stop: StopFlag::process(),
        })
    }

    /// Busy-poll until the completion of request `wr_id` arrives.
    fn wait_for(&mut self, wr_id: u64) -> Result<Wc> {
        if let Some(wc) = self.stashed.filter(|wc| wc.wr_id() == wr_id) {
            self.stashed = None;
            return Ok(wc);
        }
        let op = if wr_id == SEND_WR_ID { "send" } else { "receive" };
        loop {
            let wc = self
                .cq
                .poll_blocking_one(&self.stop)
                .map_err(|source| match source.kind() {
                    io::ErrorKind::Interrupted => Error::Interrupted,
                    _ => Error::Poll { op, source },
                })?;
            if wc.wr_id() == wr_id {
                return Ok(wc);
            }
            log::trace!("stashing completion {:?}", wc);
            self.stashed = Some(wc);
        }
    }
}

impl Channel for TransferChannel {
    fn capacity(&self) -> usize {
        self.mr.len()
    }

    fn buf(&self) -> &[u8] {
        self.mr.as_slice()
    }

    fn buf_mut(&mut self) -> &mut [u8] {
        self.mr.as_mut_slice()
    }

    fn send_exact(&mut self, offset: usize, len: usize) -> Result<()> {
        check_send_range(self.capacity(), offset, len)?;
        self.qp
            .post_send(&self.mr, offset, len, SEND_WR_ID)
            .map_err(|source| Error::Post { op: "send", source })?;
        self.wait_for(SEND_WR_ID)?
            .ok()
            .map(drop)
            .map_err(Error::SendFailed)
    }

    fn post_recv(&mut self) -> Result<()> {
        if self.recv_posted {
            return Err(Error::Protocol(
                "a receive is already outstanding".to_owned(),
            ));
        }
        self.qp
            .post_recv(&self.mr, 0, self.mr.len(), RECV_WR_ID)
            .map_err(|source| Error::Post {
                op: "receive",
                source,
            })?;
        self.recv_posted = true;
        Ok(())
    }

    fn recv_posted(&self) -> bool {
        self.recv_posted
    }

    fn wait_recv(&mut self) -> Result<Received> {
        if !self.recv_posted {
            return Err(Error::Protocol("no receive is outstanding".to_owned()));
        }
        let wc = self.wait_for(RECV_WR_ID)?;
        self.recv_posted = false;
        let len = wc.ok().map_err(Error::ReceiveFailed)?;
        Ok(Received { len })
    }
}
