//! Typed replacement for the original `match_msg(fmt, ...)` variadic
//! matcher (spec §4.1, §9). The original did two passes over the format
//! string so that a later field failing to parse couldn't leak a
//! `strdup`'d earlier field into the caller. In Rust, decoding straight
//! into locally-owned values and only returning them once the whole
//! payload has been consumed gets the same guarantee for free — there is
//! no observable "pass 1" — so `Cursor` is a single straight-line decoder.

#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("expected literal byte 0x{expected:02x}, found 0x{found:02x}")]
    LiteralMismatch { expected: u8, found: u8 },
    #[error("payload ended before the expected field")]
    Truncated,
    #[error("{0} trailing byte(s) left over after decoding the expected fields")]
    TrailingBytes(usize),
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Consumes `literal` verbatim, or fails without moving the cursor
    /// unless it failed partway through — callers that want "does this
    /// message start with this tag" semantics should call this once per
    /// candidate shape and give up on `Err` rather than reusing the cursor.
    pub fn literal(&mut self, literal: &[u8]) -> Result<(), MatchError> {
        for &expected in literal {
            let found = *self.buf.get(self.pos).ok_or(MatchError::Truncated)?;
            if found != expected {
                return Err(MatchError::LiteralMismatch { expected, found });
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// `%i`.
    pub fn int(&mut self) -> Result<u32, MatchError> {
        crate::varint::decode_from_slice(self.buf, &mut self.pos).map_err(|_| MatchError::Truncated)
    }

    /// `%s` / `%r`: length-prefixed bytes.
    pub fn bytes(&mut self) -> Result<Vec<u8>, MatchError> {
        let len = self.int()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(MatchError::Truncated)?;
        let out = self.buf[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }

    /// `%s` decoded as a lossy UTF-8 string — every textual field in this
    /// protocol (paths, argv entries, env entries) is treated as opaque
    /// bytes by the JVM side, but the client only ever needs to inspect or
    /// display them as text.
    pub fn string(&mut self) -> Result<String, MatchError> {
        Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
    }

    /// `%t`: the remainder of the payload. Must be the last thing decoded.
    pub fn tail(&mut self) -> Vec<u8> {
        let rest = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        rest
    }

    /// Call after decoding every expected field to enforce "the whole
    /// payload matched", the other half of the original's two-pass check
    /// (`tmpbuf_rd != tmpbuf_wr` => reject).
    pub fn finish(self) -> Result<(), MatchError> {
        let left = self.buf.len() - self.pos;
        if left == 0 {
            Ok(())
        } else {
            Err(MatchError::TrailingBytes(left))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PayloadBuilder;

    #[test]
    fn decodes_tag_then_int_then_consumes_fully() {
        let payload = PayloadBuilder::new()
            .literal(b"exit ")
            .write_int(7)
            .finish();
        let mut cur = Cursor::new(&payload);
        cur.literal(b"exit ").unwrap();
        let status = cur.int().unwrap();
        cur.finish().unwrap();
        assert_eq!(status, 7);
    }

    #[test]
    fn rejects_short_buffer_without_binding_outputs() {
        let mut cur = Cursor::new(&[]);
        assert_eq!(cur.literal(b"exit "), Err(MatchError::Truncated));
    }

    #[test]
    fn tail_must_be_read_last_or_finish_sees_leftovers() {
        let payload = PayloadBuilder::new().write_int(5).write_tail(b"rest").finish();
        let mut cur = Cursor::new(&payload);
        assert_eq!(cur.int().unwrap(), 5);
        assert_eq!(cur.tail(), b"rest");
        cur.finish().unwrap();
    }

    #[test]
    fn mismatched_literal_does_not_panic_and_reports_bytes() {
        let payload = PayloadBuilder::new().literal(b"run ").write_str("x").finish();
        let mut cur = Cursor::new(&payload);
        let err = cur.literal(b"exit ").unwrap_err();
        assert!(matches!(err, MatchError::LiteralMismatch { .. }));
    }
}
