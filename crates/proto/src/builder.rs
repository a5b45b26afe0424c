//! Typed replacement for the original `write_msg(fmt, ...)` variadic
//! encoder (spec §9): one method per wire primitive instead of a printf-style
//! format string, writing into an owned payload buffer that the caller then
//! hands to [`crate::framing::encode_message`].

use crate::varint;

#[derive(Debug, Default)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Literal tag bytes, e.g. the `"arg "` prefix of an `arg %s` message.
    pub fn literal(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// `%i`: a VLQ-encoded unsigned integer.
    pub fn write_int(mut self, value: u32) -> Self {
        varint::encode(value, &mut self.buf);
        self
    }

    /// `%s`: a VLQ length prefix followed by the bytes of a string.
    pub fn write_str(mut self, value: &str) -> Self {
        self.write_raw_bytes(value.as_bytes())
    }

    /// `%r`: a VLQ length prefix followed by arbitrary bytes. Wire-identical
    /// to `%s`; kept distinct because the original format grammar
    /// distinguishes "string" from "raw data" operands even though the
    /// encoding is the same (spec §4.1, §9 open question — exercised only by
    /// outbound encoding and by the round-trip test in this module).
    pub fn write_raw(self, value: &[u8]) -> Self {
        self.write_raw_bytes(value)
    }

    fn write_raw_bytes(mut self, value: &[u8]) -> Self {
        varint::encode(value.len() as u32, &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    /// `%t`: raw bytes with no length prefix. Must be the last field written
    /// — the reader recovers its length as "everything left in the message".
    pub fn write_tail(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_tag_and_operands() {
        let payload = PayloadBuilder::new()
            .literal(b"arg ")
            .write_str("hello")
            .finish();
        assert_eq!(&payload[..4], b"arg ");
    }

    #[test]
    fn empty_string_is_single_zero_byte_length() {
        let payload = PayloadBuilder::new().write_str("").finish();
        assert_eq!(payload, vec![0x00]);
    }

    #[test]
    fn raw_and_str_are_wire_identical() {
        let a = PayloadBuilder::new().write_str("xyz").finish();
        let b = PayloadBuilder::new().write_raw(b"xyz").finish();
        assert_eq!(a, b);
    }
}
