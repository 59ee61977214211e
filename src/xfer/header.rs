use crate::error::{Error, Result};

/// Length of the header message: the file length as a big-endian `u64`.
pub const HEADER_LEN: usize = 8;

/// Encode the header announcing a file of `total_len` bytes.
#[inline]
pub fn encode_header(total_len: u64) -> [u8; HEADER_LEN] {
    total_len.to_be_bytes()
}

/// Decode a received header message.
///
/// Bytes beyond the first [`HEADER_LEN`] are ignored.
pub fn decode_header(msg: &[u8]) -> Result<u64> {
    match msg.get(..HEADER_LEN) {
        Some(bytes) => {
            let mut raw = [0u8; HEADER_LEN];
            raw.copy_from_slice(bytes);
            Ok(u64::from_be_bytes(raw))
        }
        None => Err(Error::Protocol(format!(
            "header too small: {} of {} bytes",
            msg.len(),
            HEADER_LEN
        ))),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn network_byte_order() {
        assert_eq!(encode_header(0x0102), [0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(decode_header(&[0, 0, 0, 0, 0, 0, 0x10, 0x01]).unwrap(), 4097);
    }

    #[test]
    fn undersized_header_is_rejected() {
        for len in 0..HEADER_LEN {
            let err = decode_header(&vec![0u8; len]).unwrap_err();
            assert!(err.to_string().contains("header too small"), "{}", err);
        }
    }

    proptest! {
        #[test]
        fn header_integrity(len in any::<u64>()) {
            prop_assert_eq!(decode_header(&encode_header(len)).unwrap(), len);
        }

        #[test]
        fn trailing_bytes_are_ignored(len in any::<u64>(), tail in proptest::collection::vec(any::<u8>(), 0..16)) {
            let mut msg = encode_header(len).to_vec();
            msg.extend_from_slice(&tail);
            prop_assert_eq!(decode_header(&msg).unwrap(), len);
        }
    }
}
