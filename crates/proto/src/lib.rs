//! The wire-level half of the proxy protocol engine: VLQ integers,
//! length-delimited framing, and the typed message catalog carried on the
//! client↔JVM pipes. Deliberately has no knowledge of file descriptors,
//! signals, or the filesystem — that all lives in `vmrelay` (`crates/client`),
//! which implements [`framing::MessageSource`] against a real pipe.

pub mod builder;
pub mod decoder;
pub mod framing;
pub mod message;
pub mod varint;

pub use builder::PayloadBuilder;
pub use decoder::Cursor;
pub use message::{Inbound, Outbound};
