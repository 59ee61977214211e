use std::fmt;

/// Type of a connection manager event.
///
/// Values follow the `rdma_cm_event_type` ABI of `librdmacm`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmEventKind {
    AddrResolved,
    AddrError,
    RouteResolved,
    RouteError,
    ConnectRequest,
    ConnectResponse,
    ConnectError,
    Unreachable,
    Rejected,
    Established,
    Disconnected,
    DeviceRemoval,
    MulticastJoin,
    MulticastError,
    AddrChange,
    TimewaitExit,

    /// An event type this crate does not know about.
    Unknown(u32),
}

impl From<u32> for CmEventKind {
    fn from(event: u32) -> Self {
        use CmEventKind::*;
        match event {
            0 => AddrResolved,
            1 => AddrError,
            2 => RouteResolved,
            3 => RouteError,
            4 => ConnectRequest,
            5 => ConnectResponse,
            6 => ConnectError,
            7 => Unreachable,
            8 => Rejected,
            9 => Established,
            10 => Disconnected,
            11 => DeviceRemoval,
            12 => MulticastJoin,
            13 => MulticastError,
            14 => AddrChange,
            15 => TimewaitExit,
            x => Unknown(x),
        }
    }
}

impl fmt::Display for CmEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as `rdma_event_str`.
        let name = match self {
            CmEventKind::AddrResolved => "RDMA_CM_EVENT_ADDR_RESOLVED",
            CmEventKind::AddrError => "RDMA_CM_EVENT_ADDR_ERROR",
            CmEventKind::RouteResolved => "RDMA_CM_EVENT_ROUTE_RESOLVED",
            CmEventKind::RouteError => "RDMA_CM_EVENT_ROUTE_ERROR",
            CmEventKind::ConnectRequest => "RDMA_CM_EVENT_CONNECT_REQUEST",
            CmEventKind::ConnectResponse => "RDMA_CM_EVENT_CONNECT_RESPONSE",
            CmEventKind::ConnectError => "RDMA_CM_EVENT_CONNECT_ERROR",
            CmEventKind::Unreachable => "RDMA_CM_EVENT_UNREACHABLE",
            CmEventKind::Rejected => "RDMA_CM_EVENT_REJECTED",
            CmEventKind::Established => "RDMA_CM_EVENT_ESTABLISHED",
            CmEventKind::Disconnected => "RDMA_CM_EVENT_DISCONNECTED",
            CmEventKind::DeviceRemoval => "RDMA_CM_EVENT_DEVICE_REMOVAL",
            CmEventKind::MulticastJoin => "RDMA_CM_EVENT_MULTICAST_JOIN",
            CmEventKind::MulticastError => "RDMA_CM_EVENT_MULTICAST_ERROR",
            CmEventKind::AddrChange => "RDMA_CM_EVENT_ADDR_CHANGE",
            CmEventKind::TimewaitExit => "RDMA_CM_EVENT_TIMEWAIT_EXIT",
            CmEventKind::Unknown(x) => return write!(f, "unknown event {}", x),
        };
        f.write_str(name)
    }
}

#[cfg(rdma_verbs)]
const _: () = {
    use crate::bindings::rdma_cm_event_type;
    assert!(rdma_cm_event_type::RDMA_CM_EVENT_ADDR_RESOLVED == 0);
    assert!(rdma_cm_event_type::RDMA_CM_EVENT_REJECTED == 8);
    assert!(rdma_cm_event_type::RDMA_CM_EVENT_ESTABLISHED == 9);
    assert!(rdma_cm_event_type::RDMA_CM_EVENT_TIMEWAIT_EXIT == 15);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_event_types() {
        assert_eq!(CmEventKind::from(0), CmEventKind::AddrResolved);
        assert_eq!(CmEventKind::from(4), CmEventKind::ConnectRequest);
        assert_eq!(CmEventKind::from(8), CmEventKind::Rejected);
        assert_eq!(CmEventKind::from(9), CmEventKind::Established);
        assert_eq!(CmEventKind::from(42), CmEventKind::Unknown(42));
    }

    #[test]
    fn displays_like_rdma_event_str() {
        assert_eq!(
            CmEventKind::RouteResolved.to_string(),
            "RDMA_CM_EVENT_ROUTE_RESOLVED"
        );
        assert_eq!(CmEventKind::Unknown(77).to_string(), "unknown event 77");
    }
}
