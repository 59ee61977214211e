//! Reliable-connected queue pair bound to a connection manager identifier.

use std::io::{self, Error as IoError, ErrorKind as IoErrorKind};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use super::cm::CmId;
use super::cq::Cq;
use super::mr::Mr;
use super::pd::Pd;
use crate::bindings::*;
use crate::utils::interop::from_c_ret_explained;

/// Queue pair capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QpCaps {
    /// Maximum number of outstanding send work requests.
    pub max_send_wr: u32,
    /// Maximum number of outstanding receive work requests.
    pub max_recv_wr: u32,
    /// Maximum number of scatter/gather elements per send request.
    pub max_send_sge: u32,
    /// Maximum number of scatter/gather elements per receive request.
    pub max_recv_sge: u32,
}

impl Default for QpCaps {
    fn default() -> Self {
        Self {
            max_send_wr: 10,
            max_recv_wr: 10,
            max_send_sge: 1,
            max_recv_sge: 1,
        }
    }
}

impl From<QpCaps> for ibv_qp_cap {
    fn from(caps: QpCaps) -> Self {
        ibv_qp_cap {
            max_send_wr: caps.max_send_wr,
            max_recv_wr: caps.max_recv_wr,
            max_send_sge: caps.max_send_sge,
            max_recv_sge: caps.max_recv_sge,
            max_inline_data: 0,
        }
    }
}

/// Wrapper for `*mut ibv_qp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct IbvQp(NonNull<ibv_qp>);

impl_ibv_wrapper_traits!(ibv_qp, IbvQp);

/// Ownership holder of queue pair.
struct QpInner {
    cm: CmId,
    _pd: Pd,
    _cq: Cq,
}

impl Drop for QpInner {
    fn drop(&mut self) {
        // SAFETY: call only once, and no UAF since I will be dropped.
        unsafe { self.cm.destroy_qp() };
    }
}

/// Queue pair.
///
/// Both work queues report to the same completion queue, and every send
/// request is signaled.
#[derive(Clone)]
pub struct Qp {
    /// Cached QP pointer.
    qp: IbvQp,

    /// QP body.
    inner: Arc<QpInner>,
}

impl Qp {
    /// Create an RC queue pair on `cm`, which must already be bound to the
    /// device `pd` and `cq` were created on.
    pub fn new(cm: &CmId, pd: &Pd, cq: &Cq, caps: QpCaps) -> io::Result<Self> {
        let max_wr = pd.context().max_qp_wr();
        if caps.max_send_wr > max_wr || caps.max_recv_wr > max_wr {
            return Err(IoError::new(
                IoErrorKind::InvalidInput,
                format!(
                    "QP depth {}/{} exceeds device limit {}",
                    caps.max_send_wr, caps.max_recv_wr, max_wr
                ),
            ));
        }

        let mut init_attr = ibv_qp_init_attr {
            qp_context: ptr::null_mut(),
            send_cq: cq.as_raw(),
            recv_cq: cq.as_raw(),
            srq: ptr::null_mut(),
            cap: caps.into(),
            qp_type: ibv_qp_type::IBV_QPT_RC,
            sq_sig_all: 1,
        };
        let qp = cm.create_qp(pd.as_raw(), &mut init_attr)?;
        Ok(Self {
            qp: IbvQp(qp),
            inner: Arc::new(QpInner {
                cm: cm.clone(),
                _pd: pd.clone(),
                _cq: cq.clone(),
            }),
        })
    }

    /// Get the underlying `ibv_qp` pointer.
    #[inline]
    pub(crate) fn as_raw(&self) -> *mut ibv_qp {
        self.qp.as_ptr()
    }

    /// Get the QP number.
    #[inline]
    pub fn qp_num(&self) -> u32 {
        // SAFETY: the `ibv_qp` instance is valid.
        unsafe { (*self.as_raw()).qp_num }
    }

    /// Post a signaled send of `mr[offset..offset + len]`.
    ///
    /// The range must lie within the memory region and must not be modified
    /// until the completion is polled.
    pub fn post_send(&self, mr: &Mr, offset: usize, len: usize, wr_id: u64) -> io::Result<()> {
        debug_assert!(offset + len <= mr.len());
        let mut sge = ibv_sge {
            addr: mr.addr() + offset as u64,
            length: len as u32,
            lkey: mr.lkey(),
        };
        let mut wr = ibv_send_wr {
            wr_id,
            next: ptr::null_mut(),
            sg_list: &mut sge,
            num_sge: 1,
            opcode: ibv_wr_opcode::IBV_WR_SEND,
            send_flags: ibv_send_flags::IBV_SEND_SIGNALED.0,
            ..Default::default()
        };
        let mut bad_wr = ptr::null_mut();

        // SAFETY: FFI; `sge` and `wr` live until the call returns.
        let ret = unsafe { ibv_post_send(self.as_raw(), &mut wr, &mut bad_wr) };
        from_c_ret_explained(ret, post_err_explanation)
    }

    /// Post a receive into `mr[offset..offset + len]`.
    pub fn post_recv(&self, mr: &Mr, offset: usize, len: usize, wr_id: u64) -> io::Result<()> {
        debug_assert!(offset + len <= mr.len());
        let mut sge = ibv_sge {
            addr: mr.addr() + offset as u64,
            length: len as u32,
            lkey: mr.lkey(),
        };
        let mut wr = ibv_recv_wr {
            wr_id,
            next: ptr::null_mut(),
            sg_list: &mut sge,
            num_sge: 1,
        };
        let mut bad_wr = ptr::null_mut();

        // SAFETY: FFI; `sge` and `wr` live until the call returns.
        let ret = unsafe { ibv_post_recv(self.as_raw(), &mut wr, &mut bad_wr) };
        from_c_ret_explained(ret, post_err_explanation)
    }
}

fn post_err_explanation(ret: i32) -> Option<&'static str> {
    match ret {
        libc::EINVAL => Some("invalid value provided in work request"),
        libc::ENOMEM => Some("work queue is full or not enough resources to complete this operation"),
        libc::EFAULT => Some("invalid value provided in QP"),
        _ => None,
    }
}
