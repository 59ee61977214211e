//! Connection manager: event channels, identifiers, and address resolution.

mod kind;

#[cfg(rdma_verbs)]
mod addr;
#[cfg(rdma_verbs)]
mod channel;
#[cfg(rdma_verbs)]
mod id;

pub use self::kind::CmEventKind;

#[cfg(rdma_verbs)]
pub use self::{addr::AddrInfo, channel::*, id::CmId};
