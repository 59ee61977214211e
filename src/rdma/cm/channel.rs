use std::io::{self, Error as IoError};
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use super::id::CmId;
use super::kind::CmEventKind;
use crate::bindings::*;
use crate::utils::interop::from_c_ret_errno;

/// Wrapper for `*mut rdma_event_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct RdmaEventChannel(NonNull<rdma_event_channel>);

impl_ibv_wrapper_traits!(rdma_event_channel, RdmaEventChannel);

/// Ownership holder of event channel.
struct EventChannelInner {
    ec: RdmaEventChannel,
}

impl Drop for EventChannelInner {
    fn drop(&mut self) {
        log::debug!("destroying event channel {:p}", self.ec.as_ptr());
        // SAFETY: call only once, and every `CmId` holds a clone of me, so
        // no identifier is alive on this channel any more.
        unsafe { rdma_destroy_event_channel(self.ec.as_ptr()) };
    }
}

/// Connection manager event channel.
///
/// Every [`CmId`] created on the channel holds a clone of it, so the channel
/// is destroyed only after all of its identifiers.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<EventChannelInner>,
}

impl EventChannel {
    /// Create a new event channel.
    pub fn new() -> io::Result<Self> {
        // SAFETY: FFI.
        let ec = unsafe { rdma_create_event_channel() };
        let ec = NonNull::new(ec).ok_or_else(IoError::last_os_error)?;
        Ok(Self {
            inner: Arc::new(EventChannelInner {
                ec: RdmaEventChannel(ec),
            }),
        })
    }

    /// Get the underlying `rdma_event_channel` pointer.
    #[inline]
    pub(crate) fn as_raw(&self) -> *mut rdma_event_channel {
        self.inner.ec.as_ptr()
    }

    /// Block until the next event is reported on this channel.
    ///
    /// The returned event must be [`ack`](CmEvent::ack)ed right away.
    pub fn get_event(&self) -> io::Result<CmEvent> {
        let mut event = ptr::null_mut();
        // SAFETY: FFI.
        let ret = unsafe { rdma_get_cm_event(self.as_raw(), &mut event) };
        from_c_ret_errno(ret)?;
        let event = NonNull::new(event).ok_or_else(IoError::last_os_error)?;
        Ok(CmEvent {
            event,
            channel: self.clone(),
        })
    }
}

/// An event retrieved from an [`EventChannel`] and not yet acknowledged.
///
/// Dropping it without calling [`ack`](Self::ack) still acknowledges it,
/// but the acknowledgement error is lost.
pub struct CmEvent {
    event: NonNull<rdma_cm_event>,
    channel: EventChannel,
}

/// Contents of an acknowledged connection manager event.
pub struct CmEventInfo {
    /// Event type.
    pub kind: CmEventKind,

    /// Event status; negative `errno` values describe failures.
    pub status: i32,

    /// For [`CmEventKind::ConnectRequest`], the identifier of the new
    /// connection, owned by the receiver of this event.
    pub request: Option<CmId>,
}

impl CmEvent {
    /// Copy the event contents and acknowledge the event.
    pub fn ack(self) -> io::Result<CmEventInfo> {
        let this = ManuallyDrop::new(self);
        // SAFETY: the event stays valid until acknowledged.
        let event = unsafe { this.event.as_ref() };
        let kind = CmEventKind::from(event.event as u32);
        let status = event.status;
        let request = match (kind, NonNull::new(event.id)) {
            // SAFETY: a connect request hands over a fresh identifier bound to
            // the listener's channel.
            (CmEventKind::ConnectRequest, Some(id)) => {
                Some(unsafe { CmId::from_raw(id, this.channel.clone()) })
            }
            _ => None,
        };

        // SAFETY: FFI, and the event is never touched again.
        let ret = unsafe { rdma_ack_cm_event(this.event.as_ptr()) };
        // SAFETY: `this` is not used after this point.
        drop(unsafe { ptr::read(&this.channel) });
        from_c_ret_errno(ret)?;

        log::trace!("acked {} (status {})", kind, status);
        Ok(CmEventInfo {
            kind,
            status,
            request,
        })
    }
}

impl Drop for CmEvent {
    fn drop(&mut self) {
        // SAFETY: FFI.
        let ret = unsafe { rdma_ack_cm_event(self.event.as_ptr()) };
        if ret != 0 {
            log::error!(
                "cannot ack dropped cm event: {}",
                IoError::last_os_error()
            );
        }
    }
}
