//! Transfer channels: synchronous "post and wait for completion" primitives
//! over one fixed-size buffer.
//!
//! A channel never has more than one send and one receive outstanding. The
//! protocol layer in [`crate::xfer`] only talks to the [`Channel`] trait, so
//! the completion-polling backend can be replaced without touching it.

mod loopback;
#[cfg(rdma_verbs)]
mod verbs;

use std::io;
use std::ops::Range;

pub use self::loopback::LoopbackChannel;
#[cfg(rdma_verbs)]
pub use self::verbs::TransferChannel;
use crate::error::{Error, Result};

/// A completed receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Exact number of bytes the transport delivered.
    pub len: usize,
}

impl Received {
    /// The region of the channel buffer the message occupies.
    ///
    /// Receives always span the whole buffer, so messages land at offset 0.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        0..self.len
    }
}

/// A message channel over a single registered buffer.
///
/// The buffer is shared by both directions. A side that has a receive
/// outstanding must not write into the buffer.
pub trait Channel {
    /// Size of the buffer, which is also the largest message.
    fn capacity(&self) -> usize;

    /// View the buffer.
    fn buf(&self) -> &[u8];

    /// View the buffer mutably, to stage the next send.
    fn buf_mut(&mut self) -> &mut [u8];

    /// Send `buf()[offset..offset + len]` as one message and wait until its
    /// completion is observed.
    fn send_exact(&mut self, offset: usize, len: usize) -> Result<()>;

    /// Post one receive spanning the whole buffer.
    ///
    /// Fails if a receive is already outstanding.
    fn post_recv(&mut self) -> Result<()>;

    /// Whether a receive is currently outstanding.
    fn recv_posted(&self) -> bool;

    /// Wait until the outstanding receive completes.
    ///
    /// Fails if no receive is outstanding.
    fn wait_recv(&mut self) -> Result<Received>;
}

/// Check that a send range lies within a buffer of `capacity` bytes.
pub(crate) fn check_send_range(capacity: usize, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::Post {
            op: "send",
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "range {}+{} exceeds buffer capacity {}",
                    offset, len, capacity
                ),
            ),
        }),
    }
}
