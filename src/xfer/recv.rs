use std::io::{self, Write};

use super::header::{decode_header, HEADER_LEN};
use super::send::check_capacity;
use super::session::TransferSession;
use crate::channel::Channel;
use crate::error::{Error, Result};

/// Receive one file from `channel` into `dest`.
///
/// The first message is the header. Data messages follow until the declared
/// length is reached; a receive is re-armed before every message, and never
/// while one is still outstanding. A receive the caller already posted
/// before the connection was accepted is used for the header.
///
/// A failed or short `write` stops the loop with [`Error::Io`] after
/// accounting for the bytes that did reach `dest`.
pub fn receive<C, W>(channel: &mut C, session: &mut TransferSession<'_>, dest: &mut W) -> Result<()>
where
    C: Channel + ?Sized,
    W: Write + ?Sized,
{
    check_capacity(channel.capacity())?;

    session.begin_handshake()?;
    if !channel.recv_posted() {
        channel.post_recv()?;
    }
    let header = channel.wait_recv()?;
    let total_len = decode_header(&channel.buf()[header.range()])?;
    if header.len > HEADER_LEN {
        log::warn!(
            "ignoring {} trailing bytes after the header",
            header.len - HEADER_LEN
        );
    }
    session.set_total(total_len)?;
    log::debug!("header received, expecting {} bytes", total_len);

    while !session.is_complete() {
        channel.post_recv()?;
        let msg = channel.wait_recv()?;
        if msg.len == 0 {
            log::warn!("ignoring empty data message");
            continue;
        }
        session.admit(msg.len)?;

        let chunk = &channel.buf()[msg.range()];
        let written = write_once(dest, chunk)?;
        session.record(&chunk[..written]);
        if written < chunk.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, chunk.len()),
            )));
        }
    }
    dest.flush()?;
    Ok(())
}

/// Issue one `write`, retrying only on interruption.
fn write_once<W: Write + ?Sized>(dest: &mut W, chunk: &[u8]) -> io::Result<usize> {
    loop {
        match dest.write(chunk) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            res => return res,
        }
    }
}
