use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::{check_send_range, Channel, Received};
use crate::error::{Error, Result};
use crate::rdma::status::WcStatus;
use crate::stop::StopFlag;

/// How often a waiting receive checks the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// In-process channel endpoint, connected to exactly one peer.
///
/// Sends are buffered, so one endpoint may run its whole send loop before
/// the other starts receiving. Transport faults are reported with the
/// completion statuses a reliable connection would produce:
///
/// - a message larger than the receiver's buffer fails the receive with
///   [`WcStatus::LocLenErr`];
/// - sending to a dropped peer fails with [`WcStatus::RetryExcErr`];
/// - waiting while the peer is gone and nothing is queued fails with
///   [`WcStatus::WrFlushErr`].
///
/// Every delivered message length is recorded for inspection. Both
/// endpoints of a pair share one [`StopFlag`]; raising it makes pending and
/// later operations fail with [`Error::Interrupted`].
pub struct LoopbackChannel {
    buf: Box<[u8]>,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    recv_posted: bool,
    delivered: Vec<usize>,
    stop: StopFlag,
}

impl LoopbackChannel {
    /// Create two connected endpoints with buffers of `capacity` bytes.
    pub fn pair(capacity: usize) -> (Self, Self) {
        Self::pair_with_capacities(capacity, capacity)
    }

    /// Create two connected endpoints with buffers of different sizes.
    pub fn pair_with_capacities(first: usize, second: usize) -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        let stop = StopFlag::new();
        let endpoint = |capacity: usize, tx, rx| Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            tx,
            rx,
            recv_posted: false,
            delivered: Vec::new(),
            stop: stop.clone(),
        };
        (endpoint(first, tx_a, rx_a), endpoint(second, tx_b, rx_b))
    }

    /// Lengths of all messages this endpoint has received, in order.
    pub fn delivered(&self) -> &[usize] {
        &self.delivered
    }

    /// The stop flag shared by both endpoints.
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn recv_message(&self) -> Result<Vec<u8>> {
        loop {
            self.stop.check()?;
            match self.rx.recv_timeout(STOP_CHECK_INTERVAL) {
                Ok(msg) => return Ok(msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::ReceiveFailed(WcStatus::WrFlushErr))
                }
            }
        }
    }
}

impl Channel for LoopbackChannel {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn buf(&self) -> &[u8] {
        &self.buf
    }

    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn send_exact(&mut self, offset: usize, len: usize) -> Result<()> {
        check_send_range(self.capacity(), offset, len)?;
        self.stop.check()?;
        self.tx
            .send(self.buf[offset..offset + len].to_vec())
            .map_err(|_| Error::SendFailed(WcStatus::RetryExcErr))
    }

    fn post_recv(&mut self) -> Result<()> {
        if self.recv_posted {
            return Err(Error::Protocol(
                "a receive is already outstanding".to_owned(),
            ));
        }
        self.recv_posted = true;
        Ok(())
    }

    fn recv_posted(&self) -> bool {
        self.recv_posted
    }

    fn wait_recv(&mut self) -> Result<Received> {
        if !self.recv_posted {
            return Err(Error::Protocol("no receive is outstanding".to_owned()));
        }
        let msg = self.recv_message();
        self.recv_posted = false;

        let msg = msg?;
        if msg.len() > self.buf.len() {
            return Err(Error::ReceiveFailed(WcStatus::LocLenErr));
        }
        self.buf[..msg.len()].copy_from_slice(&msg);
        self.delivered.push(msg.len());
        Ok(Received { len: msg.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_exact_lengths() {
        let (mut a, mut b) = LoopbackChannel::pair(16);
        a.buf_mut()[..5].copy_from_slice(b"hello");
        a.send_exact(0, 5).unwrap();
        a.buf_mut()[3..6].copy_from_slice(b"abc");
        a.send_exact(3, 3).unwrap();

        b.post_recv().unwrap();
        let r = b.wait_recv().unwrap();
        assert_eq!(&b.buf()[r.range()], b"hello");
        b.post_recv().unwrap();
        let r = b.wait_recv().unwrap();
        assert_eq!(&b.buf()[r.range()], b"abc");
        assert_eq!(b.delivered(), &[5, 3]);
    }

    #[test]
    fn single_outstanding_receive() {
        let (_a, mut b) = LoopbackChannel::pair(16);
        assert!(matches!(b.wait_recv(), Err(Error::Protocol(_))));
        b.post_recv().unwrap();
        assert!(b.recv_posted());
        assert!(matches!(b.post_recv(), Err(Error::Protocol(_))));
    }

    #[test]
    fn send_range_is_checked() {
        let (mut a, _b) = LoopbackChannel::pair(16);
        assert!(a.send_exact(16, 0).is_ok());
        assert!(matches!(a.send_exact(8, 9), Err(Error::Post { op: "send", .. })));
        assert!(matches!(
            a.send_exact(usize::MAX, 2),
            Err(Error::Post { .. })
        ));
    }

    #[test]
    fn raised_stop_flag_ends_a_pending_wait() {
        let (a, mut b) = LoopbackChannel::pair(16);
        b.post_recv().unwrap();

        let stop = a.stop_flag().clone();
        let waiter = std::thread::spawn(move || {
            let res = b.wait_recv();
            (res, b.recv_posted())
        });
        std::thread::sleep(Duration::from_millis(50));
        stop.raise();

        let (res, posted) = waiter.join().unwrap();
        assert!(matches!(res, Err(Error::Interrupted)));
        assert!(!posted);
        drop(a);
    }

    #[test]
    fn raised_stop_flag_refuses_sends() {
        let (mut a, b) = LoopbackChannel::pair(16);
        b.stop_flag().raise();
        assert!(matches!(a.send_exact(0, 4), Err(Error::Interrupted)));
    }

    #[test]
    fn transport_faults_map_to_statuses() {
        let (mut a, mut b) = LoopbackChannel::pair_with_capacities(16, 8);
        a.send_exact(0, 9).unwrap();
        b.post_recv().unwrap();
        assert!(matches!(
            b.wait_recv(),
            Err(Error::ReceiveFailed(WcStatus::LocLenErr))
        ));
        assert!(!b.recv_posted());

        drop(a);
        b.post_recv().unwrap();
        assert!(matches!(
            b.wait_recv(),
            Err(Error::ReceiveFailed(WcStatus::WrFlushErr))
        ));
        assert!(matches!(
            b.send_exact(0, 1),
            Err(Error::SendFailed(WcStatus::RetryExcErr))
        ));
    }
}
