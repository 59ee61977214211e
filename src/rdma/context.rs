use std::ffi::CStr;
use std::fmt;
use std::io::{self, Error as IoError, ErrorKind as IoErrorKind};
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use super::cm::CmId;
use crate::bindings::*;
use crate::utils::interop::from_c_ret;

/// Wrapper for `*mut ibv_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct IbvContext(NonNull<ibv_context>);

impl_ibv_wrapper_traits!(ibv_context, IbvContext);

/// Ownership holder of device context.
///
/// The device itself is opened and closed by the connection manager; the
/// identifier clone keeps it open.
struct ContextInner {
    cm: CmId,
    ctx: IbvContext,
    name: String,
    attr: ibv_device_attr,
}

/// Device context of a connection manager identifier.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("ctx", &self.inner.ctx)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Context {
    /// Get the device context of an identifier and query its attributes.
    ///
    /// Fail with [`NotConnected`](IoErrorKind::NotConnected) if the
    /// identifier is not yet bound to a device.
    pub fn of(cm: &CmId) -> io::Result<Self> {
        let ctx = cm.verbs().ok_or_else(|| {
            IoError::new(IoErrorKind::NotConnected, "cm id is not bound to a device")
        })?;

        // SAFETY: POD type.
        let mut attr = unsafe { mem::zeroed() };
        // SAFETY: FFI.
        let ret = unsafe { ibv_query_device(ctx.as_ptr(), &mut attr) };
        from_c_ret(ret)?;

        // SAFETY: the device of an open context is valid, and its name is a
        // NUL-terminated string.
        let name = unsafe { CStr::from_ptr(ibv_get_device_name((*ctx.as_ptr()).device)) }
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            inner: Arc::new(ContextInner {
                cm: cm.clone(),
                ctx: IbvContext(ctx),
                name,
                attr,
            }),
        })
    }

    /// Get the underlying `ibv_context` pointer.
    #[inline]
    pub(crate) fn as_raw(&self) -> *mut ibv_context {
        self.inner.ctx.as_ptr()
    }

    /// Get the identifier this context belongs to.
    #[inline]
    pub fn cm(&self) -> &CmId {
        &self.inner.cm
    }

    /// Get the device name, e.g., `mlx5_0`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the maximum number of entries of a completion queue.
    #[inline]
    pub fn max_cqe(&self) -> u32 {
        self.inner.attr.max_cqe as u32
    }

    /// Get the maximum number of outstanding work requests on any queue.
    #[inline]
    pub fn max_qp_wr(&self) -> u32 {
        self.inner.attr.max_qp_wr as u32
    }
}
