use std::fmt;

use crate::bindings::*;
use crate::rdma::status::WcStatus;

/// Work completion entry.
///
/// Transparent over `ibv_wc`, so arrays of it can be polled into directly.
#[derive(Clone, Copy, Default)]
#[repr(transparent)]
pub struct Wc(pub(crate) ibv_wc);

impl Wc {
    /// Get the work request ID.
    #[inline]
    pub fn wr_id(&self) -> u64 {
        self.0.wr_id
    }

    /// Get the completion status.
    #[inline]
    pub fn status(&self) -> WcStatus {
        WcStatus::from(self.0.status)
    }

    /// Get the number of bytes transferred.
    ///
    /// Only meaningful for successful receive completions.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.0.byte_len as usize
    }

    /// Return `Ok(byte_len)` if the completion is successful, otherwise the
    /// failure status.
    #[inline]
    pub fn ok(&self) -> Result<usize, WcStatus> {
        match self.status() {
            WcStatus::Success => Ok(self.byte_len()),
            status => Err(status),
        }
    }
}

impl fmt::Debug for Wc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wc")
            .field("wr_id", &self.wr_id())
            .field("status", &self.status())
            .field("byte_len", &self.byte_len())
            .finish()
    }
}
