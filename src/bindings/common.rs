//! Data-path verbs that `libibverbs` only provides as `static inline`
//! functions, and therefore never appear in the generated bindings.

use super::private::*;

/// Poll a CQ for work completions.
///
/// Poll a CQ for (possibly multiple) completions. If the return value
/// is < 0, an error occurred. If the return value is >= 0, it is the
/// number of completions returned. If the return value is
/// non-negative and strictly less than num_entries, then the CQ was
/// emptied.
///
/// # Arguments
///
/// - `cq`: the CQ being polled
/// - `num_entries`: maximum number of completions to return
/// - `wc`: array of at least @num_entries of &struct ibv_wc where completions
///   will be returned
#[inline]
pub unsafe fn ibv_poll_cq(
    cq: *mut ibv_cq,
    num_entries: ::std::os::raw::c_int,
    wc: *mut ibv_wc,
) -> ::std::os::raw::c_int {
    (*(*cq).context).ops.poll_cq.unwrap()(cq, num_entries, wc)
}

/// Post a list of work requests to a send queue.
///
/// If IBV_SEND_INLINE flag is set, the data buffers can be reused
/// immediately after the call returns.
#[inline]
pub unsafe fn ibv_post_send(
    qp: *mut ibv_qp,
    wr: *mut ibv_send_wr,
    bad_wr: *mut *mut ibv_send_wr,
) -> ::std::os::raw::c_int {
    (*(*qp).context).ops.post_send.unwrap()(qp, wr, bad_wr)
}

/// Post a list of work requests to a receive queue.
#[inline]
pub unsafe fn ibv_post_recv(
    qp: *mut ibv_qp,
    wr: *mut ibv_recv_wr,
    bad_wr: *mut *mut ibv_recv_wr,
) -> ::std::os::raw::c_int {
    (*(*qp).context).ops.post_recv.unwrap()(qp, wr, bad_wr)
}
