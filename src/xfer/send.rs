use std::io::{self, Read};

use super::header::{encode_header, HEADER_LEN};
use super::session::TransferSession;
use crate::channel::Channel;
use crate::error::{Error, Result};

/// Send `total_len` bytes of `source` over `channel`: the header first, then
/// data messages of `min(capacity, remaining)` bytes each.
///
/// No end marker follows the data. If `source` ends early, the bytes read so
/// far are still sent and the call fails with [`Error::ShortRead`], so the
/// receiver never sees a complete file. Bytes beyond `total_len` are never
/// read.
pub fn send<C, R>(
    channel: &mut C,
    session: &mut TransferSession<'_>,
    source: &mut R,
    total_len: u64,
) -> Result<()>
where
    C: Channel + ?Sized,
    R: Read + ?Sized,
{
    check_capacity(channel.capacity())?;

    session.begin_handshake()?;
    channel.buf_mut()[..HEADER_LEN].copy_from_slice(&encode_header(total_len));
    channel.send_exact(0, HEADER_LEN)?;
    session.set_total(total_len)?;
    log::debug!("header sent, {} bytes to go", total_len);

    while session.remaining() > 0 {
        let want = session.remaining().min(channel.capacity() as u64) as usize;
        let n = read_full(source, &mut channel.buf_mut()[..want])?;
        if n == 0 {
            return Err(Error::ShortRead {
                sent: session.bytes_transferred(),
                declared: total_len,
            });
        }

        channel.send_exact(0, n)?;
        session.record(&channel.buf()[..n]);
    }
    Ok(())
}

/// Read until `buf` is full or the source is exhausted.
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub(super) fn check_capacity(capacity: usize) -> Result<()> {
    if capacity < HEADER_LEN {
        return Err(Error::Config(format!(
            "buffer capacity {} cannot hold the {}-byte header",
            capacity, HEADER_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn read_full_fills_across_short_reads() {
        let data = [7u8; 10];
        let mut source = Trickle {
            data: &data,
            step: 3,
        };
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut source, &mut buf).unwrap(), 8);
        assert_eq!(read_full(&mut source, &mut buf).unwrap(), 2);
        assert_eq!(read_full(&mut source, &mut buf).unwrap(), 0);
    }

    #[test]
    fn tiny_buffers_are_rejected() {
        assert!(matches!(check_capacity(7), Err(Error::Config(_))));
        assert!(check_capacity(8).is_ok());
    }
}
