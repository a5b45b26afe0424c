//! Length-delimited framing: `{VLQ length}{payload}` on both pipe
//! directions (spec §4.1, §6). This module only handles the length
//! prefix/payload split; actual pipe I/O (retry on `EINTR`, fatal handling
//! of short reads and EOF) is the caller's concern, expressed here as the
//! [`MessageSource`] trait so the client crate can wire it to a real fd
//! without this crate knowing anything about file descriptors.

use crate::varint;
use std::io;

/// Supplies the bytes of one message read, one byte or one exact-length
/// chunk at a time.
pub trait MessageSource {
    fn next_byte(&mut self) -> io::Result<u8>;
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

/// Prepends the VLQ-encoded length of `payload` to it, producing the exact
/// bytes that should be written to the pipe in one or more `write` calls.
pub fn encode_message(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 5);
    varint::encode(payload.len() as u32, &mut framed);
    framed.extend_from_slice(payload);
    framed
}

/// Reads one complete message: a VLQ length, then exactly that many bytes.
/// Any I/O error here (including EOF before the length completes, or a
/// short read within the payload) should be treated as fatal by the
/// caller, per spec §4.1 and §7.
pub fn read_message<S: MessageSource>(source: &mut S) -> io::Result<Vec<u8>> {
    let len = varint::decode_streaming(|| source.next_byte())? as usize;
    let mut payload = vec![0u8; len];
    source.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SliceSource<'a> {
        buf: &'a [u8],
        pos: usize,
    }

    impl<'a> MessageSource for SliceSource<'a> {
        fn next_byte(&mut self) -> io::Result<u8> {
            let b = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
            self.pos += 1;
            Ok(b)
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            let end = self.pos + buf.len();
            if end > self.buf.len() {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            buf.copy_from_slice(&self.buf[self.pos..end]);
            self.pos = end;
            Ok(())
        }
    }

    #[test]
    fn round_trips_through_encode_and_read() {
        let framed = encode_message(b"hello world");
        let mut source = SliceSource { buf: &framed, pos: 0 };
        let payload = read_message(&mut source).unwrap();
        assert_eq!(payload, b"hello world");
    }

    #[test]
    fn short_payload_is_an_error() {
        let mut framed = encode_message(b"hello world");
        framed.truncate(framed.len() - 3);
        let mut source = SliceSource { buf: &framed, pos: 0 };
        assert!(read_message(&mut source).is_err());
    }
}
