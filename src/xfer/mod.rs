//! The file transfer protocol.
//!
//! On the wire, a transfer is one 8-byte big-endian length header followed by
//! raw data messages of at most the buffer capacity each, in file order. Data
//! messages carry no framing: the receiver takes each message's length from
//! its completion and stops once the declared length is reached.

mod header;
mod recv;
mod send;
mod session;

pub use self::header::{decode_header, encode_header, HEADER_LEN};
pub use self::recv::receive;
pub use self::send::send;
pub use self::session::{Role, TransferReport, TransferSession, TransferState};

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use proptest::prelude::*;

    use super::*;
    use crate::channel::{Channel, LoopbackChannel};
    use crate::error::{Error, ErrorKind, SessionError};
    use crate::rdma::status::WcStatus;
    use crate::sink::StatusEvent;

    fn session(role: Role, sink: &mut Vec<StatusEvent>) -> TransferSession<'_> {
        let mut session = TransferSession::new(role, sink);
        session.connecting("loopback").unwrap();
        session.connected("loopback").unwrap();
        session
    }

    struct Outcome {
        sent: Result<TransferReport, SessionError>,
        received: Result<TransferReport, SessionError>,
        output: Vec<u8>,
        delivered: Vec<usize>,
    }

    /// Send `declared` bytes of `source`, then receive them on the other end.
    fn transfer(source: &[u8], declared: u64, capacity: usize) -> Outcome {
        let (mut tx, mut rx) = LoopbackChannel::pair(capacity);

        let mut sender_events = Vec::new();
        let mut sender = session(Role::Initiator, &mut sender_events);
        let res = send(&mut tx, &mut sender, &mut &source[..], declared);
        let sent = sender.finish(res);
        drop(tx);

        let mut receiver_events = Vec::new();
        let mut receiver = session(Role::Responder, &mut receiver_events);
        let mut output = Vec::new();
        let res = receive(&mut rx, &mut receiver, &mut output);
        let received = receiver.finish(res);

        Outcome {
            sent,
            received,
            output,
            delivered: rx.delivered().to_vec(),
        }
    }

    fn round_trip(content: &[u8], capacity: usize) -> Outcome {
        let outcome = transfer(content, content.len() as u64, capacity);
        let sent = outcome.sent.as_ref().unwrap();
        let received = outcome.received.as_ref().unwrap();
        assert_eq!(outcome.output, content);
        assert_eq!(sent.sha256, received.sha256);
        assert_eq!(sent.data_messages, received.data_messages);
        outcome
    }

    #[test]
    fn empty_file() {
        let outcome = round_trip(b"", 4096);
        assert_eq!(outcome.delivered, vec![HEADER_LEN]);
        let report = outcome.received.unwrap();
        assert_eq!(report.total_bytes, 0);
        assert_eq!(report.data_messages, 0);
    }

    #[test]
    fn file_of_exactly_one_buffer() {
        let content: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();
        let outcome = round_trip(&content, 4096);
        assert_eq!(outcome.delivered, vec![HEADER_LEN, 4096]);
    }

    #[test]
    fn file_one_byte_over_buffer() {
        let content = vec![0xa5u8; 4097];
        let outcome = round_trip(&content, 4096);
        assert_eq!(outcome.delivered, vec![HEADER_LEN, 4096, 1]);
    }

    #[test]
    fn truncated_source_is_short_read() {
        let source = vec![1u8; 6000];
        let outcome = transfer(&source, 10_000, 4096);

        let sent = outcome.sent.unwrap_err();
        assert!(matches!(
            sent.source,
            Error::ShortRead {
                sent: 6000,
                declared: 10_000
            }
        ));
        assert_eq!(sent.bytes_transferred, 6000);
        assert_eq!(sent.state, TransferState::Streaming);

        let received = outcome.received.unwrap_err();
        assert!(matches!(
            received.source,
            Error::ReceiveFailed(WcStatus::WrFlushErr)
        ));
        assert_eq!(received.bytes_transferred, 6000);
        assert_eq!(outcome.output.len(), 6000);
    }

    #[test]
    fn longer_source_is_cut_at_declared_length() {
        let source = vec![3u8; 100];
        let outcome = transfer(&source, 40, 16);
        assert_eq!(outcome.sent.unwrap().bytes_transferred, 40);
        assert_eq!(outcome.output, vec![3u8; 40]);
        assert_eq!(outcome.delivered, vec![HEADER_LEN, 16, 16, 8]);
    }

    #[test]
    fn undersized_header_is_protocol_error() {
        let (mut tx, mut rx) = LoopbackChannel::pair(64);
        tx.send_exact(0, 4).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let res = receive(&mut rx, &mut receiver, &mut io::sink());
        let err = receiver.finish(res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.state, TransferState::HandshakeInFlight);
        assert!(err.to_string().contains("header too small"));
    }

    #[test]
    fn overrun_is_protocol_error() {
        let (mut tx, mut rx) = LoopbackChannel::pair(64);
        tx.buf_mut()[..HEADER_LEN].copy_from_slice(&encode_header(3));
        tx.send_exact(0, HEADER_LEN).unwrap();
        tx.send_exact(0, 5).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let mut output = Vec::new();
        let res = receive(&mut rx, &mut receiver, &mut output);
        let err = receiver.finish(res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.bytes_transferred, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn empty_data_messages_are_skipped() {
        let (mut tx, mut rx) = LoopbackChannel::pair(64);
        tx.buf_mut()[..HEADER_LEN].copy_from_slice(&encode_header(3));
        tx.send_exact(0, HEADER_LEN).unwrap();
        tx.send_exact(0, 0).unwrap();
        tx.buf_mut()[..3].copy_from_slice(b"abc");
        tx.send_exact(0, 3).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let mut output = Vec::new();
        let res = receive(&mut rx, &mut receiver, &mut output);
        let report = receiver.finish(res).unwrap();
        assert_eq!(output, b"abc");
        assert_eq!(report.data_messages, 1);
    }

    #[test]
    fn pre_posted_receive_takes_the_header() {
        let (mut tx, mut rx) = LoopbackChannel::pair(64);
        rx.post_recv().unwrap();

        let mut events = Vec::new();
        let mut sender = session(Role::Initiator, &mut events);
        let res = send(&mut tx, &mut sender, &mut &b"payload"[..], 7);
        sender.finish(res).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let mut output = Vec::new();
        let res = receive(&mut rx, &mut receiver, &mut output);
        receiver.finish(res).unwrap();
        assert_eq!(output, b"payload");
    }

    /// Accepts `limit` bytes in total, then writes short.
    struct Limited {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit - self.data.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_write_reports_partial_count() {
        let (mut tx, mut rx) = LoopbackChannel::pair(4096);
        let mut events = Vec::new();
        let mut sender = session(Role::Initiator, &mut events);
        let res = send(&mut tx, &mut sender, &mut &[9u8; 10_000][..], 10_000);
        sender.finish(res).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let mut dest = Limited {
            data: Vec::new(),
            limit: 5000,
        };
        let res = receive(&mut rx, &mut receiver, &mut dest);
        let err = receiver.finish(res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.bytes_transferred, 5000);
        assert_eq!(dest.data.len(), 5000);
        assert!(matches!(
            events.last(),
            Some(StatusEvent::Failed {
                bytes_transferred: 5000,
                ..
            })
        ));
    }

    #[test]
    fn stalled_transfer_stops_on_request() {
        let (mut tx, mut rx) = LoopbackChannel::pair(4096);
        tx.buf_mut()[..HEADER_LEN].copy_from_slice(&encode_header(10_000));
        tx.send_exact(0, HEADER_LEN).unwrap();
        tx.send_exact(0, 4096).unwrap();
        let stop = tx.stop_flag().clone();

        let receiver = std::thread::spawn(move || {
            let mut events = Vec::new();
            let mut receiver = session(Role::Responder, &mut events);
            let mut output = Vec::new();
            let res = receive(&mut rx, &mut receiver, &mut output);
            let res = receiver.finish(res);
            (res, output.len(), events)
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        stop.raise();

        let (res, written, events) = receiver.join().unwrap();
        let err = res.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert_eq!(err.bytes_transferred, 4096);
        assert_eq!(err.state, TransferState::Streaming);
        assert_eq!(written, 4096);
        assert!(matches!(
            events.last(),
            Some(StatusEvent::Failed {
                kind: ErrorKind::Interrupted,
                ..
            })
        ));
        drop(tx);
    }

    #[test]
    fn failed_write_is_io_error() {
        let (mut tx, mut rx) = LoopbackChannel::pair(4096);
        let mut events = Vec::new();
        let mut sender = session(Role::Initiator, &mut events);
        let res = send(&mut tx, &mut sender, &mut &[9u8; 5000][..], 5000);
        sender.finish(res).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let res = receive(&mut rx, &mut receiver, &mut Broken);
        let err = receiver.finish(res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.bytes_transferred, 0);
    }

    #[test]
    fn receiver_progress_is_monotonic() {
        let content = vec![1u8; 3 * 4096 + 17];
        let (mut tx, mut rx) = LoopbackChannel::pair(4096);
        let mut events = Vec::new();
        let mut sender = session(Role::Initiator, &mut events);
        let res = send(&mut tx, &mut sender, &mut &content[..], content.len() as u64);
        sender.finish(res).unwrap();

        let mut events = Vec::new();
        let mut receiver = session(Role::Responder, &mut events);
        let res = receive(&mut rx, &mut receiver, &mut io::sink());
        receiver.finish(res).unwrap();

        let progress: Vec<(u64, u64)> = events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Progress {
                    bytes, total_bytes, ..
                } => Some((*bytes, *total_bytes)),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 4);
        assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(progress.iter().all(|&(bytes, total)| bytes <= total));
        assert_eq!(progress.last(), Some(&(content.len() as u64, content.len() as u64)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn round_trip_preserves_content(
            content in proptest::collection::vec(any::<u8>(), 0..20_000),
            capacity in HEADER_LEN..5000usize,
        ) {
            let outcome = round_trip(&content, capacity);

            let data = &outcome.delivered[1..];
            prop_assert!(data.iter().all(|&len| len > 0 && len <= capacity));
            prop_assert_eq!(data.iter().sum::<usize>(), content.len());
            prop_assert_eq!(data.len(), content.len().div_ceil(capacity));
        }
    }
}
