//! Work completion status.

use serde::Serialize;
use thiserror::Error;

/// Status of a completion queue entry.
///
/// Discriminants follow the `ibv_wc_status` ABI of `libibverbs`, so this type
/// is usable (and testable) even when the native libraries are absent.
/// Descriptions are condensed from [RDMAmojo](https://www.rdmamojo.com/2013/02/15/ibv_poll_cq/).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum WcStatus {
    /// The work request ended and its buffers are ready to be reused.
    #[error("success")]
    Success = 0,

    /// A message exceeds the port's maximum message size, or a posted receive
    /// is too small for the incoming message.
    #[error("local length error")]
    LocLenErr = 1,

    /// Internal QP consistency error while processing the work request.
    #[error("local QP operation error")]
    LocQpOpErr = 2,

    /// EE context consistency error (RD only, unused).
    #[error("local EE context operation error")]
    LocEecOpErr = 3,

    /// The scatter/gather list does not reference a valid memory region for
    /// the requested operation.
    #[error("local protection error")]
    LocProtErr = 4,

    /// The work request was outstanding when the QP entered the error state.
    #[error("WR flush error")]
    WrFlushErr = 5,

    /// Binding a memory window to a memory region failed.
    #[error("memory window bind error")]
    MwBindErr = 6,

    /// The responder returned an unexpected transport opcode.
    #[error("bad response error")]
    BadRespErr = 7,

    /// Protection error on a local buffer during an incoming RDMA write with
    /// immediate.
    #[error("local access error")]
    LocAccessErr = 8,

    /// The responder detected an invalid message on the channel.
    #[error("remote invalid request error")]
    RemInvReqErr = 9,

    /// Protection error on a remote buffer.
    #[error("remote access error")]
    RemAccessErr = 10,

    /// The responder could not complete the operation.
    #[error("remote operation error")]
    RemOpErr = 11,

    /// The remote side sent neither ACK nor NACK within the retry budget;
    /// usually the peer QP is gone or misconfigured.
    #[error("transport retry counter exceeded")]
    RetryExcErr = 12,

    /// The remote side kept answering RNR NAK: no receive was posted in time.
    #[error("RNR retry counter exceeded")]
    RnrRetryExcErr = 13,

    /// RDD violation (RD only, unused).
    #[error("local RDD violation error")]
    LocRddViolErr = 14,

    /// Invalid incoming RD message (RD only, unused).
    #[error("remote invalid RD request")]
    RemInvRdReqErr = 15,

    /// The responder aborted the operation.
    #[error("remote aborted error")]
    RemAbortErr = 16,

    /// Invalid EE context number (RD only, unused).
    #[error("invalid EE context number")]
    InvEecnErr = 17,

    /// Illegal operation for the EE context state (RD only, unused).
    #[error("invalid EE context state error")]
    InvEecStateErr = 18,

    /// A fatal error that may not be recoverable.
    #[error("fatal error")]
    FatalErr = 19,

    /// A response timed out.
    #[error("response timeout error")]
    RespTimeoutErr = 20,

    /// Any other error, including status codes unknown to this crate.
    #[error("general error")]
    GeneralErr = 21,
}

impl WcStatus {
    /// Whether this status reports a successful completion.
    #[inline]
    pub fn is_success(self) -> bool {
        self == WcStatus::Success
    }
}

impl From<u32> for WcStatus {
    fn from(wc_status: u32) -> Self {
        use WcStatus::*;
        match wc_status {
            0 => Success,
            1 => LocLenErr,
            2 => LocQpOpErr,
            3 => LocEecOpErr,
            4 => LocProtErr,
            5 => WrFlushErr,
            6 => MwBindErr,
            7 => BadRespErr,
            8 => LocAccessErr,
            9 => RemInvReqErr,
            10 => RemAccessErr,
            11 => RemOpErr,
            12 => RetryExcErr,
            13 => RnrRetryExcErr,
            14 => LocRddViolErr,
            15 => RemInvRdReqErr,
            16 => RemAbortErr,
            17 => InvEecnErr,
            18 => InvEecStateErr,
            19 => FatalErr,
            20 => RespTimeoutErr,
            _ => GeneralErr,
        }
    }
}

#[cfg(rdma_verbs)]
const _: () = {
    use crate::bindings::ibv_wc_status;
    assert!(ibv_wc_status::IBV_WC_SUCCESS == WcStatus::Success as u32);
    assert!(ibv_wc_status::IBV_WC_WR_FLUSH_ERR == WcStatus::WrFlushErr as u32);
    assert!(ibv_wc_status::IBV_WC_RNR_RETRY_EXC_ERR == WcStatus::RnrRetryExcErr as u32);
    assert!(ibv_wc_status::IBV_WC_GENERAL_ERR == WcStatus::GeneralErr as u32);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_abi_values() {
        assert_eq!(WcStatus::from(0), WcStatus::Success);
        assert_eq!(WcStatus::from(1), WcStatus::LocLenErr);
        assert_eq!(WcStatus::from(12), WcStatus::RetryExcErr);
        assert_eq!(WcStatus::from(13), WcStatus::RnrRetryExcErr);
        for raw in 0..=21u32 {
            assert_eq!(WcStatus::from(raw) as u32, raw);
        }
    }

    #[test]
    fn unknown_values_are_general_errors() {
        assert_eq!(WcStatus::from(22), WcStatus::GeneralErr);
        assert_eq!(WcStatus::from(u32::MAX), WcStatus::GeneralErr);
        assert!(!WcStatus::from(99).is_success());
    }
}
