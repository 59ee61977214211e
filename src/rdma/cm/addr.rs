use std::ffi::CString;
use std::io::{self, Error as IoError, ErrorKind as IoErrorKind};
use std::mem;
use std::ptr::{self, NonNull};

use crate::bindings::*;

/// Address information resolved by `rdma_getaddrinfo`, freed on drop.
pub struct AddrInfo {
    ai: NonNull<rdma_addrinfo>,
}

impl AddrInfo {
    /// Resolve `node` and `port` in the TCP-like RDMA port space.
    ///
    /// With `passive` set, the result describes a local address to bind to
    /// (and `node` may be `None` for the wildcard address); otherwise it
    /// describes a destination to connect to.
    pub fn resolve(node: Option<&str>, port: u16, passive: bool) -> io::Result<Self> {
        let node = node
            .map(CString::new)
            .transpose()
            .map_err(|e| IoError::new(IoErrorKind::InvalidInput, e))?;
        let service = CString::new(port.to_string())
            .map_err(|e| IoError::new(IoErrorKind::InvalidInput, e))?;

        // SAFETY: POD type.
        let mut hints = unsafe { mem::zeroed::<rdma_addrinfo>() };
        hints.ai_port_space = rdma_port_space::RDMA_PS_TCP as _;
        if passive {
            hints.ai_flags = RAI_PASSIVE as _;
        }

        let mut res = ptr::null_mut();
        // SAFETY: FFI; all strings outlive the call.
        let rc = unsafe {
            rdma_getaddrinfo(
                node.as_ref().map_or(ptr::null(), |s| s.as_ptr()) as *mut _,
                service.as_ptr() as *mut _,
                &mut hints,
                &mut res,
            )
        };
        match rc {
            0 => NonNull::new(res)
                .map(|ai| Self { ai })
                .ok_or_else(|| IoError::new(IoErrorKind::NotFound, "no address returned")),
            -1 => Err(IoError::last_os_error()),
            rc => Err(IoError::new(
                IoErrorKind::Other,
                format!("getaddrinfo failed with code {}", rc),
            )),
        }
    }

    /// Get the resolved destination address, or null if there is none.
    #[inline]
    pub(crate) fn dst_addr(&self) -> *mut sockaddr {
        // SAFETY: the `rdma_addrinfo` instance is valid.
        unsafe { (*self.ai.as_ptr()).ai_dst_addr }
    }

    /// Get the resolved source address, or null if there is none.
    #[inline]
    pub(crate) fn src_addr(&self) -> *mut sockaddr {
        // SAFETY: the `rdma_addrinfo` instance is valid.
        unsafe { (*self.ai.as_ptr()).ai_src_addr }
    }
}

impl Drop for AddrInfo {
    fn drop(&mut self) {
        // SAFETY: call only once, and no UAF since I will be dropped.
        unsafe { rdma_freeaddrinfo(self.ai.as_ptr()) };
    }
}
