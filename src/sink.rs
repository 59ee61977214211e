//! Status reporting to the front end.
//!
//! A front end receives [`StatusEvent`]s through a [`StatusSink`]. Events are
//! emitted at milestones only; no particular chunk boundary is meaningful to
//! the front end.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::xfer::{Role, TransferReport};

/// A milestone of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    /// The responder is waiting for a connection.
    Listening { port: u16 },

    /// Connection establishment started.
    Connecting { peer: String },

    /// The connection is established.
    Connected { peer: String },

    /// The file length is known to both sides.
    Handshake { role: Role, total_bytes: u64 },

    /// Payload bytes transferred so far.
    Progress {
        role: Role,
        bytes: u64,
        total_bytes: u64,
    },

    /// The whole file was transferred.
    Completed(TransferReport),

    /// The received file is stored.
    Saved { path: String },

    /// The transfer was aborted.
    Failed {
        role: Role,
        kind: ErrorKind,
        message: String,
        bytes_transferred: u64,
    },
}

fn verb(role: Role) -> &'static str {
    match role {
        Role::Initiator => "sent",
        Role::Responder => "received",
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Listening { port } => write!(f, "listening on port {}", port),
            StatusEvent::Connecting { peer } => write!(f, "connecting to {}", peer),
            StatusEvent::Connected { peer } => write!(f, "connected to {}", peer),
            StatusEvent::Handshake { role, total_bytes } => {
                let action = match role {
                    Role::Initiator => "sending",
                    Role::Responder => "receiving",
                };
                write!(f, "{} file of {}", action, HumanSize(*total_bytes))
            }
            StatusEvent::Progress {
                role,
                bytes,
                total_bytes,
            } => {
                let percent = match *total_bytes {
                    0 => 100.0,
                    total => *bytes as f64 * 100.0 / total as f64,
                };
                write!(
                    f,
                    "{} {} of {} ({:.1}%)",
                    verb(*role),
                    HumanSize(*bytes),
                    HumanSize(*total_bytes),
                    percent
                )
            }
            StatusEvent::Completed(report) => {
                write!(
                    f,
                    "{} {} in {:.3} s ({:.2} MiB/s)",
                    verb(report.role),
                    HumanSize(report.bytes_transferred),
                    report.elapsed_secs,
                    report.throughput_mib_s
                )?;
                if let Some(sha256) = &report.sha256 {
                    write!(f, ", sha256 {}", sha256)?;
                }
                Ok(())
            }
            StatusEvent::Saved { path } => write!(f, "file saved to {}", path),
            StatusEvent::Failed {
                message,
                bytes_transferred,
                ..
            } => write!(
                f,
                "transfer failed after {}: {}",
                HumanSize(*bytes_transferred),
                message
            ),
        }
    }
}

/// Byte count rendered with binary units, e.g., `4.00 KiB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanSize(pub u64);

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
        if self.0 < 1024 {
            return write!(f, "{} B", self.0);
        }
        let mut value = self.0 as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit + 1 < UNITS.len() {
            value /= 1024.0;
            unit += 1;
        }
        write!(f, "{:.2} {}", value, UNITS[unit])
    }
}

/// Receiver of status events.
pub trait StatusSink {
    fn emit(&mut self, event: &StatusEvent);
}

/// Collects events in memory.
impl StatusSink for Vec<StatusEvent> {
    fn emit(&mut self, event: &StatusEvent) {
        self.push(event.clone());
    }
}

/// Renders events as human-readable lines through `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn emit(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Failed { .. } => log::error!("{}", event),
            StatusEvent::Progress { .. } => log::debug!("{}", event),
            _ => log::info!("{}", event),
        }
    }
}

/// Writes one JSON object per event and line.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatusSink for JsonSink<W> {
    fn emit(&mut self, event: &StatusEvent) {
        let res = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = res {
            log::warn!("cannot write status event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_sizes() {
        assert_eq!(HumanSize(0).to_string(), "0 B");
        assert_eq!(HumanSize(1023).to_string(), "1023 B");
        assert_eq!(HumanSize(4096).to_string(), "4.00 KiB");
        assert_eq!(HumanSize(1536 * 1024).to_string(), "1.50 MiB");
        assert_eq!(HumanSize(u64::MAX).to_string(), "16.00 EiB");
    }

    #[test]
    fn readable_lines() {
        assert_eq!(
            StatusEvent::Listening { port: 7471 }.to_string(),
            "listening on port 7471"
        );
        assert_eq!(
            StatusEvent::Progress {
                role: Role::Responder,
                bytes: 2048,
                total_bytes: 4096
            }
            .to_string(),
            "received 2.00 KiB of 4.00 KiB (50.0%)"
        );
        assert_eq!(
            StatusEvent::Failed {
                role: Role::Initiator,
                kind: ErrorKind::ShortRead,
                message: "short read".into(),
                bytes_transferred: 10,
            }
            .to_string(),
            "transfer failed after 10 B: short read"
        );
    }

    #[test]
    fn json_lines() {
        let mut sink = JsonSink::new(Vec::new());
        sink.emit(&StatusEvent::Connected {
            peer: "10.0.0.2".into(),
        });
        sink.emit(&StatusEvent::Completed(TransferReport {
            role: Role::Responder,
            total_bytes: 3,
            bytes_transferred: 3,
            data_messages: 1,
            elapsed_secs: 0.5,
            throughput_mib_s: 0.0,
            path: None,
            sha256: None,
        }));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "connected");
        assert_eq!(lines[0]["peer"], "10.0.0.2");
        assert_eq!(lines[1]["event"], "completed");
        assert_eq!(lines[1]["role"], "responder");
        assert_eq!(lines[1]["bytes_transferred"], 3);
        assert!(lines[1].get("sha256").is_none());
    }
}
