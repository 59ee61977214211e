//! The two ends of a transfer, wiring connection establishment, the
//! transfer channel, and the protocol together for one file.

use std::fs::File;
use std::path::Path;

use crate::channel::{Channel, TransferChannel};
use crate::config::Config;
use crate::ctrl::{Connecter, Connection, Listener};
use crate::error::{Result, SessionError};
use crate::sink::{StatusEvent, StatusSink};
use crate::xfer::{self, Role, TransferReport, TransferSession};

fn disconnect(conn: &Connection) {
    if let Err(e) = conn.disconnect() {
        log::warn!("cannot disconnect from {}: {}", conn.peer(), e);
    }
}

/// Client: connects to a responder and sends one file.
pub struct Initiator {
    config: Config,
}

impl Initiator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Send the file at `path` to the responder on `server`.
    pub fn send_file(
        &self,
        server: &str,
        path: impl AsRef<Path>,
        sink: &mut dyn StatusSink,
    ) -> Result<TransferReport, SessionError> {
        let path = path.as_ref();
        let mut session =
            TransferSession::for_config(Role::Initiator, &self.config, sink).with_path(path);
        let result = self.run(server, path, &mut session);
        session.finish(result)
    }

    fn run(&self, server: &str, path: &Path, session: &mut TransferSession<'_>) -> Result<()> {
        let mut file = File::open(path)?;
        let total_len = file.metadata()?.len();

        session.connecting(&format!("{}:{}", server, self.config.port))?;
        let connecter = Connecter::new(self.config.resolve_timeout());
        let (conn, mut channel) = connecter.connect(server, self.config.port, |ctx| {
            TransferChannel::create(ctx, &self.config, Role::Initiator)
        })?;
        session.connected(conn.peer())?;

        let result = xfer::send(&mut channel, session, &mut file, total_len);
        disconnect(&conn);
        result
    }
}

/// Server: waits for one initiator and stores the file it sends.
pub struct Responder {
    config: Config,
}

impl Responder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Receive one file into the configured output path, which is created
    /// or truncated first.
    pub fn receive_file(
        &self,
        sink: &mut dyn StatusSink,
    ) -> Result<TransferReport, SessionError> {
        let path = &self.config.output_path;
        let mut session =
            TransferSession::for_config(Role::Responder, &self.config, &mut *sink).with_path(path);
        let result = self.run(&mut session);
        let report = session.finish(result)?;

        sink.emit(&StatusEvent::Saved {
            path: path.display().to_string(),
        });
        Ok(report)
    }

    fn run(&self, session: &mut TransferSession<'_>) -> Result<()> {
        let mut file = File::create(&self.config.output_path)?;

        let listener = Listener::bind(self.config.port)?;
        session.listening(listener.port())?;
        let (conn, mut channel) = listener.accept_with(|ctx| {
            let mut channel = TransferChannel::create(ctx, &self.config, Role::Responder)?;
            channel.post_recv()?;
            Ok(channel)
        })?;
        session.connected(conn.peer())?;

        let result = xfer::receive(&mut channel, session, &mut file)
            .and_then(|_| file.sync_all().map_err(Into::into));
        disconnect(&conn);
        result
    }
}
