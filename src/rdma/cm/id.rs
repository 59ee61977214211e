use std::io::{self, Error as IoError};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use super::addr::AddrInfo;
use super::channel::EventChannel;
use crate::bindings::*;
use crate::utils::interop::from_c_ret_errno;

/// Wrapper for `*mut rdma_cm_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct RdmaCmId(NonNull<rdma_cm_id>);

impl_ibv_wrapper_traits!(rdma_cm_id, RdmaCmId);

/// Ownership holder of connection manager identifier.
struct CmIdInner {
    id: RdmaCmId,
    _channel: EventChannel,
}

impl Drop for CmIdInner {
    fn drop(&mut self) {
        // SAFETY: call only once, and no UAF since I will be dropped.
        let ret = unsafe { rdma_destroy_id(self.id.as_ptr()) };
        if ret != 0 {
            log::error!("cannot destroy cm id: {}", IoError::last_os_error());
        }
    }
}

/// Connection manager identifier, the RDMA counterpart of a socket.
///
/// Verbs resources created on the identifier's device context hold a clone
/// of it, so the identifier is destroyed only after all of them.
#[derive(Clone)]
pub struct CmId {
    /// Cached identifier pointer.
    id: RdmaCmId,

    /// Identifier body.
    inner: Arc<CmIdInner>,
}

impl CmId {
    /// Create a new identifier in the TCP-like port space, reporting events
    /// to `channel`.
    pub fn new(channel: &EventChannel) -> io::Result<Self> {
        let mut id = ptr::null_mut();
        // SAFETY: FFI.
        let ret = unsafe {
            rdma_create_id(
                channel.as_raw(),
                &mut id,
                ptr::null_mut(),
                rdma_port_space::RDMA_PS_TCP,
            )
        };
        from_c_ret_errno(ret)?;
        let id = NonNull::new(id).ok_or_else(IoError::last_os_error)?;

        // SAFETY: the identifier was just created on `channel`.
        Ok(unsafe { Self::from_raw(id, channel.clone()) })
    }

    /// Take ownership of an identifier created by the library.
    ///
    /// # Safety
    ///
    /// - `id` must be a valid identifier that nobody else destroys.
    /// - `id` must report its events to `channel`.
    pub(crate) unsafe fn from_raw(id: NonNull<rdma_cm_id>, channel: EventChannel) -> Self {
        let id = RdmaCmId(id);
        Self {
            id,
            inner: Arc::new(CmIdInner {
                id,
                _channel: channel,
            }),
        }
    }

    /// Get the underlying `rdma_cm_id` pointer.
    #[inline]
    pub(crate) fn as_raw(&self) -> *mut rdma_cm_id {
        self.id.as_ptr()
    }

    /// Get the device context the identifier is bound to, if any.
    ///
    /// Available once the address is resolved (active side) or on
    /// identifiers handed over by connect requests (passive side).
    #[inline]
    pub(crate) fn verbs(&self) -> Option<NonNull<ibv_context>> {
        // SAFETY: the identifier is valid.
        NonNull::new(unsafe { (*self.as_raw()).verbs })
    }

    /// Get the queue pair created on this identifier, if any.
    #[inline]
    pub(crate) fn qp(&self) -> Option<NonNull<ibv_qp>> {
        // SAFETY: the identifier is valid.
        NonNull::new(unsafe { (*self.as_raw()).qp })
    }

    /// Start resolving the destination address. Completion is reported as
    /// an address event on the channel.
    pub fn resolve_addr(&self, dst: &AddrInfo, timeout_ms: i32) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe {
            rdma_resolve_addr(
                self.as_raw(),
                ptr::null_mut(),
                dst.dst_addr(),
                timeout_ms,
            )
        };
        from_c_ret_errno(ret)
    }

    /// Start resolving the route to the resolved address. Completion is
    /// reported as a route event on the channel.
    pub fn resolve_route(&self, timeout_ms: i32) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe { rdma_resolve_route(self.as_raw(), timeout_ms) };
        from_c_ret_errno(ret)
    }

    /// Bind to a local address.
    pub fn bind_addr(&self, src: &AddrInfo) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe { rdma_bind_addr(self.as_raw(), src.src_addr()) };
        from_c_ret_errno(ret)
    }

    /// Listen for incoming connection requests.
    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe { rdma_listen(self.as_raw(), backlog) };
        from_c_ret_errno(ret)
    }

    /// Create a queue pair on the identifier.
    ///
    /// The queue pair is owned by the identifier and must be destroyed with
    /// [`destroy_qp`](Self::destroy_qp).
    pub(crate) fn create_qp(
        &self,
        pd: *mut ibv_pd,
        init_attr: &mut ibv_qp_init_attr,
    ) -> io::Result<NonNull<ibv_qp>> {
        // SAFETY: FFI.
        let ret = unsafe { rdma_create_qp(self.as_raw(), pd, init_attr) };
        from_c_ret_errno(ret)?;
        self.qp().ok_or_else(IoError::last_os_error)
    }

    /// Destroy the queue pair created on the identifier.
    ///
    /// # Safety
    ///
    /// - The queue pair must not be destroyed more than once.
    /// - The queue pair must not be used anymore.
    pub(crate) unsafe fn destroy_qp(&self) {
        rdma_destroy_qp(self.as_raw());
    }

    /// Initiate a connection on an identifier whose route is resolved.
    pub fn connect(&self) -> io::Result<()> {
        let mut param = conn_param();
        // SAFETY: FFI.
        let ret = unsafe { rdma_connect(self.as_raw(), &mut param) };
        from_c_ret_errno(ret)
    }

    /// Accept the connection request this identifier was created for.
    pub fn accept(&self) -> io::Result<()> {
        let mut param = conn_param();
        // SAFETY: FFI.
        let ret = unsafe { rdma_accept(self.as_raw(), &mut param) };
        from_c_ret_errno(ret)
    }

    /// Disconnect. The peer observes a disconnected event.
    pub fn disconnect(&self) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe { rdma_disconnect(self.as_raw()) };
        from_c_ret_errno(ret)
    }
}

/// Connection parameters shared by both sides: one outstanding RDMA read
/// each way and the maximum retry budgets.
fn conn_param() -> rdma_conn_param {
    rdma_conn_param {
        responder_resources: 1,
        initiator_depth: 1,
        retry_count: 7,
        rnr_retry_count: 7,
        ..Default::default()
    }
}
