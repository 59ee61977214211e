use std::fmt;
use std::path::{Path, PathBuf};

use quanta::{Clock, Instant};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Error, Result, SessionError};
use crate::sink::{StatusEvent, StatusSink};

/// Which end of the transfer a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The client; connects and sends the file.
    Initiator,
    /// The server; listens and receives the file.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        })
    }
}

/// Progress of a transfer session.
///
/// ```text
/// Idle -> Connecting -> Connected -> HandshakeInFlight -> Streaming -> Complete
/// ```
///
/// Any non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    Connecting,
    Connected,
    HandshakeInFlight,
    Streaming,
    Complete,
    Failed,
}

impl TransferState {
    /// Whether no further transition is possible.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Complete | TransferState::Failed)
    }

    /// Whether `next` directly follows this state.
    pub fn can_advance_to(self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Connecting)
            | (Connecting, Connected)
            | (Connected, HandshakeInFlight)
            | (HandshakeInFlight, Streaming)
            | (Streaming, Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferState::Idle => "idle",
            TransferState::Connecting => "connecting",
            TransferState::Connected => "connected",
            TransferState::HandshakeInFlight => "handshake in flight",
            TransferState::Streaming => "streaming",
            TransferState::Complete => "complete",
            TransferState::Failed => "failed",
        })
    }
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReport {
    pub role: Role,
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    pub data_messages: u64,
    pub elapsed_secs: f64,
    pub throughput_mib_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// One file being transferred.
///
/// Tracks the state machine and the byte accounting, and reports every
/// milestone to a [`StatusSink`]. The byte count never exceeds the declared
/// total; the session is complete exactly when both are equal.
pub struct TransferSession<'a> {
    role: Role,
    state: TransferState,
    total_len: Option<u64>,
    transferred: u64,
    messages: u64,
    path: Option<PathBuf>,

    sink: &'a mut dyn StatusSink,
    hasher: Option<Sha256>,
    progress_interval: u64,
    next_progress: u64,

    clock: Clock,
    started: Option<Instant>,
}

impl<'a> TransferSession<'a> {
    /// Create an idle session reporting to `sink`, with digests enabled and
    /// a progress event for every message.
    pub fn new(role: Role, sink: &'a mut dyn StatusSink) -> Self {
        Self {
            role,
            state: TransferState::Idle,
            total_len: None,
            transferred: 0,
            messages: 0,
            path: None,
            sink,
            hasher: Some(Sha256::new()),
            progress_interval: 0,
            next_progress: 0,
            clock: Clock::new(),
            started: None,
        }
    }

    /// Create an idle session with the digest and progress settings of
    /// `config`.
    pub fn for_config(role: Role, config: &Config, sink: &'a mut dyn StatusSink) -> Self {
        Self::new(role, sink)
            .with_digest(config.digest)
            .with_progress_interval(config.progress_interval)
    }

    /// Enable or disable the SHA-256 digest of the payload.
    pub fn with_digest(mut self, digest: bool) -> Self {
        self.hasher = digest.then(Sha256::new);
        self
    }

    /// Report progress every `interval` payload bytes; 0 reports every
    /// message.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Name the local file, for reports.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// The declared file length, once the handshake is done.
    #[inline]
    pub fn total_len(&self) -> Option<u64> {
        self.total_len
    }

    #[inline]
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred
    }

    /// Number of data messages recorded so far.
    #[inline]
    pub fn data_messages(&self) -> u64 {
        self.messages
    }

    /// Payload bytes still expected; 0 before the handshake.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.total_len.map_or(0, |total| total - self.transferred)
    }

    /// Whether every declared byte has been transferred.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.total_len == Some(self.transferred)
    }

    /// Move to `next`, failing on transitions the state machine forbids.
    pub fn advance(&mut self, next: TransferState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::Protocol(format!(
                "invalid transition from {} to {}",
                self.state, next
            )));
        }
        log::trace!("{} session: {} -> {}", self.role, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Start establishing the connection to (or from) `peer`.
    pub fn connecting(&mut self, peer: &str) -> Result<()> {
        self.advance(TransferState::Connecting)?;
        self.sink.emit(&StatusEvent::Connecting {
            peer: peer.to_owned(),
        });
        Ok(())
    }

    /// Start waiting for a connection on `port`.
    pub fn listening(&mut self, port: u16) -> Result<()> {
        self.advance(TransferState::Connecting)?;
        self.sink.emit(&StatusEvent::Listening { port });
        Ok(())
    }

    /// Mark the connection to `peer` as established.
    pub fn connected(&mut self, peer: &str) -> Result<()> {
        self.advance(TransferState::Connected)?;
        self.sink.emit(&StatusEvent::Connected {
            peer: peer.to_owned(),
        });
        Ok(())
    }

    /// Start the handshake. The clock starts here.
    pub fn begin_handshake(&mut self) -> Result<()> {
        self.advance(TransferState::HandshakeInFlight)?;
        self.started = Some(self.clock.now());
        Ok(())
    }

    /// Finish the handshake with the declared file length and start
    /// streaming.
    pub fn set_total(&mut self, total_len: u64) -> Result<()> {
        self.advance(TransferState::Streaming)?;
        self.total_len = Some(total_len);
        self.next_progress = self.progress_interval;
        self.sink.emit(&StatusEvent::Handshake {
            role: self.role,
            total_bytes: total_len,
        });
        Ok(())
    }

    /// Check that a message of `len` payload bytes fits in what remains.
    pub fn admit(&self, len: usize) -> Result<()> {
        if self.state != TransferState::Streaming {
            return Err(Error::Protocol(format!(
                "data message while {}",
                self.state
            )));
        }
        if len as u64 > self.remaining() {
            return Err(Error::Protocol(format!(
                "message of {} bytes overruns declared length ({} bytes remaining)",
                len,
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Account for payload bytes that reached the other side (sender) or the
    /// destination (receiver). The caller must have [`admit`](Self::admit)ted
    /// them.
    pub fn record(&mut self, chunk: &[u8]) {
        debug_assert!(chunk.len() as u64 <= self.remaining());
        self.transferred += chunk.len() as u64;
        self.messages += 1;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(chunk);
        }

        if self.transferred >= self.next_progress || self.is_complete() {
            self.next_progress = self.transferred.saturating_add(self.progress_interval);
            self.sink.emit(&StatusEvent::Progress {
                role: self.role,
                bytes: self.transferred,
                total_bytes: self.total_len.unwrap_or(0),
            });
        }
    }

    /// End the session with the outcome of the protocol loop.
    ///
    /// A successful loop must have transferred exactly the declared length.
    /// On failure, the error is reported to the sink and returned with the
    /// byte count and the state the session failed in.
    pub fn finish(mut self, result: Result<()>) -> Result<TransferReport, SessionError> {
        let result = result.and_then(|_| {
            if self.is_complete() {
                self.advance(TransferState::Complete)
            } else {
                Err(Error::Protocol(format!(
                    "transfer ended after {} of {} bytes",
                    self.transferred,
                    self.total_len.unwrap_or(0)
                )))
            }
        });

        match result {
            Ok(()) => {
                let report = self.report();
                self.sink.emit(&StatusEvent::Completed(report.clone()));
                Ok(report)
            }
            Err(source) => {
                let state = self.state;
                if !state.is_terminal() {
                    self.state = TransferState::Failed;
                }
                self.sink.emit(&StatusEvent::Failed {
                    role: self.role,
                    kind: source.kind(),
                    message: source.to_string(),
                    bytes_transferred: self.transferred,
                });
                Err(SessionError {
                    source,
                    bytes_transferred: self.transferred,
                    state,
                })
            }
        }
    }

    fn report(&mut self) -> TransferReport {
        let elapsed = self
            .started
            .map(|started| self.clock.now().duration_since(started))
            .unwrap_or_default();
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput_mib_s = if elapsed_secs > 0.0 {
            self.transferred as f64 / (1024.0 * 1024.0) / elapsed_secs
        } else {
            0.0
        };
        let sha256 = self.hasher.take().map(|hasher| {
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect()
        });

        TransferReport {
            role: self.role,
            total_bytes: self.total_len.unwrap_or(0),
            bytes_transferred: self.transferred,
            data_messages: self.messages,
            elapsed_secs,
            throughput_mib_s,
            path: self.path.clone(),
            sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn streaming(session: &mut TransferSession, total: u64) {
        session.connecting("peer").unwrap();
        session.connected("peer").unwrap();
        session.begin_handshake().unwrap();
        session.set_total(total).unwrap();
    }

    #[test]
    fn state_machine_transitions() {
        use TransferState::*;
        let order = [Idle, Connecting, Connected, HandshakeInFlight, Streaming, Complete];
        for pair in order.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]));
            assert!(!pair[1].can_advance_to(pair[0]));
        }
        for state in &order[..5] {
            assert!(state.can_advance_to(Failed));
        }
        assert!(!Complete.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Streaming));
        assert!(!HandshakeInFlight.can_advance_to(Complete));
    }

    #[test]
    fn accounting_never_overruns() {
        let mut events: Vec<StatusEvent> = Vec::new();
        let mut session = TransferSession::new(Role::Responder, &mut events);
        streaming(&mut session, 10);

        session.admit(6).unwrap();
        session.record(&[1; 6]);
        assert_eq!(session.remaining(), 4);
        assert!(matches!(session.admit(5), Err(Error::Protocol(_))));
        session.admit(4).unwrap();
        session.record(&[2; 4]);
        assert!(session.is_complete());
        assert!(session.admit(1).is_err());

        let report = session.finish(Ok(())).unwrap();
        assert_eq!(report.bytes_transferred, 10);
        assert_eq!(report.data_messages, 2);
        let expected: String = Sha256::digest([vec![1u8; 6], vec![2u8; 4]].concat())
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(report.sha256, Some(expected));
        assert!(matches!(events.last(), Some(StatusEvent::Completed(_))));
    }

    #[test]
    fn digest_of_empty_stream() {
        let mut events: Vec<StatusEvent> = Vec::new();
        let mut session = TransferSession::new(Role::Initiator, &mut events);
        streaming(&mut session, 0);
        assert!(session.is_complete());
        let report = session.finish(Ok(())).unwrap();
        assert_eq!(
            report.sha256.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(report.data_messages, 0);
    }

    #[test]
    fn incomplete_success_is_rejected() {
        let mut events: Vec<StatusEvent> = Vec::new();
        let mut session = TransferSession::new(Role::Responder, &mut events).with_digest(false);
        streaming(&mut session, 10);
        session.record(&[0; 3]);
        let err = session.finish(Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.bytes_transferred, 3);
        assert_eq!(err.state, TransferState::Streaming);
    }

    #[test]
    fn failure_reports_state_and_progress() {
        let mut events: Vec<StatusEvent> = Vec::new();
        let mut session = TransferSession::new(Role::Initiator, &mut events);
        session.connecting("10.0.0.1").unwrap();
        let err = session
            .finish(Err(Error::ConnectRejected("RDMA_CM_EVENT_REJECTED".into())))
            .unwrap_err();
        assert_eq!(err.state, TransferState::Connecting);
        assert_eq!(err.bytes_transferred, 0);
        assert!(matches!(
            events.last(),
            Some(StatusEvent::Failed {
                kind: ErrorKind::ConnectRejected,
                ..
            })
        ));
    }

    #[test]
    fn progress_follows_interval() {
        let mut events: Vec<StatusEvent> = Vec::new();
        let mut session = TransferSession::new(Role::Initiator, &mut events)
            .with_progress_interval(100)
            .with_digest(false);
        streaming(&mut session, 250);
        for _ in 0..5 {
            session.record(&[0; 50]);
        }
        drop(session);

        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Progress { bytes, .. } => Some(*bytes),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![100, 200, 250]);
    }
}
