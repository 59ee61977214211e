mod perm;

use std::ffi::c_void;
use std::io::{self, Error as IoError};
use std::ptr::NonNull;

pub use self::perm::*;
use super::pd::Pd;
use crate::bindings::*;
use crate::utils::interop::from_c_ret;

/// Wrapper for `*mut ibv_mr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct IbvMr(NonNull<ibv_mr>);

impl IbvMr {
    /// Get the local key of the memory region.
    pub fn lkey(&self) -> u32 {
        // SAFETY: the `ibv_mr` instance is valid.
        unsafe { (*self.as_ptr()).lkey }
    }

    /// Deregister the MR.
    ///
    /// # Safety
    ///
    /// - An MR must not be deregistered more than once.
    /// - Deregistered MRs must not be used anymore.
    pub unsafe fn dereg(self) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = ibv_dereg_mr(self.as_ptr());
        from_c_ret(ret)
    }
}

impl_ibv_wrapper_traits!(ibv_mr, IbvMr);

/// Memory region over a buffer it owns.
///
/// The buffer is deregistered before it is freed.
pub struct Mr {
    mr: IbvMr,
    buf: Box<[u8]>,
    _pd: Pd,
}

impl Mr {
    /// Allocate a zeroed buffer of `len` bytes and register it with the
    /// given protection domain.
    pub fn alloc(pd: &Pd, len: usize, perm: Permission) -> io::Result<Self> {
        let mut buf = vec![0u8; len].into_boxed_slice();
        // SAFETY: FFI; the buffer is heap-allocated and never moves.
        let mr = unsafe {
            ibv_reg_mr(
                pd.as_raw(),
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                perm.into(),
            )
        };
        let mr = NonNull::new(mr).ok_or_else(IoError::last_os_error)?;
        Ok(Self {
            mr: IbvMr(mr),
            buf,
            _pd: pd.clone(),
        })
    }

    /// Get the local key of the memory region.
    #[inline]
    pub fn lkey(&self) -> u32 {
        self.mr.lkey()
    }

    /// Get the start address of the registered buffer.
    #[inline]
    pub fn addr(&self) -> u64 {
        self.buf.as_ptr() as u64
    }

    /// Get the length of the registered buffer.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// View the registered buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// View the registered buffer mutably.
    ///
    /// The caller must not write to ranges an outstanding work request
    /// refers to.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for Mr {
    fn drop(&mut self) {
        // SAFETY: call only once, and no UAF since I will be dropped.
        if let Err(e) = unsafe { self.mr.dereg() } {
            log::error!("cannot dereg MR on drop: {}", e);
        }
    }
}
