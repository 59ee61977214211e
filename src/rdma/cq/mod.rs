//! Completion queue and work completion.

mod wc;

use std::io::{self, Error as IoError, ErrorKind as IoErrorKind};
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::Arc;

pub use self::wc::*;
use super::context::Context;
use crate::bindings::*;
use crate::stop::StopFlag;
use crate::utils::interop::from_c_ret;

/// Wrapper for `*mut ibv_cq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct IbvCq(NonNull<ibv_cq>);

impl IbvCq {
    /// Destroy the CQ.
    ///
    /// # Safety
    ///
    /// - A CQ must not be destroyed more than once.
    /// - Destroyed CQs must not be used anymore.
    pub unsafe fn destroy(self) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = ibv_destroy_cq(self.as_ptr());
        from_c_ret(ret)
    }
}

impl_ibv_wrapper_traits!(ibv_cq, IbvCq);

/// Ownership holder of completion queue.
struct CqInner {
    _ctx: Context,
    cq: IbvCq,
}

impl Drop for CqInner {
    fn drop(&mut self) {
        // SAFETY: call only once, and no UAF since I will be dropped.
        if let Err(e) = unsafe { self.cq.destroy() } {
            log::error!("cannot destroy CQ on drop: {}", e);
        }
    }
}

/// Completion queue.
#[derive(Clone)]
pub struct Cq {
    /// Cached CQ pointer.
    cq: IbvCq,

    /// CQ body.
    inner: Arc<CqInner>,
}

impl Cq {
    /// Create a new completion queue with at least `depth` entries.
    pub fn new(ctx: &Context, depth: u32) -> io::Result<Self> {
        if depth > ctx.max_cqe() {
            return Err(IoError::new(
                IoErrorKind::InvalidInput,
                format!("CQ depth {} exceeds device limit {}", depth, ctx.max_cqe()),
            ));
        }

        // SAFETY: FFI.
        let cq = unsafe {
            ibv_create_cq(
                ctx.as_raw(),
                depth as i32,
                ptr::null_mut(),
                ptr::null_mut(),
                0,
            )
        };
        let cq = IbvCq(NonNull::new(cq).ok_or_else(IoError::last_os_error)?);
        Ok(Self {
            cq,
            inner: Arc::new(CqInner {
                _ctx: ctx.clone(),
                cq,
            }),
        })
    }

    /// Get the underlying `ibv_cq` pointer.
    #[inline]
    pub(crate) fn as_raw(&self) -> *mut ibv_cq {
        self.cq.as_ptr()
    }

    /// Non-blockingly poll one work completion.
    ///
    /// It is the caller's responsibility to check the status code of the
    /// returned work completion entry.
    #[inline(always)]
    pub fn poll_one(&self) -> io::Result<Option<Wc>> {
        let mut wc = <MaybeUninit<Wc>>::uninit();
        // SAFETY: FFI, and that `Wc` is transparent over `ibv_wc`.
        let num = unsafe { ibv_poll_cq(self.as_raw(), 1, wc.as_mut_ptr().cast()) };
        match num {
            0 => Ok(None),
            // SAFETY: `ibv_poll_cq` returning 1 means `wc` is initialized.
            1 => Ok(Some(unsafe { wc.assume_init() })),
            n => Err(IoError::from_raw_os_error(-n)),
        }
    }

    /// Busy-poll until one work completion arrives or `stop` is raised.
    ///
    /// Fail with [`Interrupted`](IoErrorKind::Interrupted) in the latter
    /// case.
    pub fn poll_blocking_one(&self, stop: &StopFlag) -> io::Result<Wc> {
        loop {
            if let Some(wc) = self.poll_one()? {
                return Ok(wc);
            }
            if stop.is_raised() {
                return Err(IoErrorKind::Interrupted.into());
            }
            std::hint::spin_loop();
        }
    }
}
