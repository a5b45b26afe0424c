//! The closed catalog of messages carried on each pipe direction (spec §6).
//! Encoding is infallible. Decoding never fails on a well-framed payload it
//! doesn't recognize — that's [`Inbound::Unknown`], a value, not an error —
//! because spec §7 treats an unrecognised message as a warning, not a fault.

use crate::builder::PayloadBuilder;
use crate::decoder::Cursor;

/// Messages the client sends to the JVM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound<'a> {
    Classpath(&'a str),
    Alias(&'a str),
    IdleTimeout(u32),
    NewProxy(u32),
    Arg(&'a str),
    Env(&'a str),
    Cwd(&'a str),
    Run(&'a str),
    Shutdown,
    ConSize { cols: u32, rows: u32 },
    /// `kind` follows the C source's convention of casting a signed `-1`
    /// (spawn failure) into the unsigned wire integer; `-1i32 as u32` wraps
    /// to `0xFFFF_FFFF`, matching the original's `(uint) -1` cast exactly.
    RunStatus { kind: i32, code: u32 },
    Eof,
    /// `0%t`: a chunk of raw stdin bytes.
    StdinChunk(&'a [u8]),
}

impl<'a> Outbound<'a> {
    pub fn encode(&self) -> Vec<u8> {
        let b = PayloadBuilder::new();
        match *self {
            Outbound::Classpath(path) => b.literal(b"classpath ").write_str(path),
            Outbound::Alias(alias) => b.literal(b"alias ").write_str(alias),
            Outbound::IdleTimeout(minutes) => b.literal(b"idle_timeout ").write_int(minutes),
            Outbound::NewProxy(slot) => b.literal(b"new_proxy ").write_int(slot),
            Outbound::Arg(arg) => b.literal(b"arg ").write_str(arg),
            Outbound::Env(kv) => b.literal(b"env ").write_str(kv),
            Outbound::Cwd(cwd) => b.literal(b"cwd ").write_str(cwd),
            Outbound::Run(cmd) => b.literal(b"run ").write_str(cmd),
            Outbound::Shutdown => b.literal(b"shutdown"),
            Outbound::ConSize { cols, rows } => {
                b.literal(b"con-size ").write_int(cols).write_int(rows)
            }
            Outbound::RunStatus { kind, code } => b
                .literal(b"run-status ")
                .write_int(kind as u32)
                .write_int(code),
            Outbound::Eof => b.literal(b"EOF"),
            Outbound::StdinChunk(bytes) => b.literal(b"0").write_tail(bytes),
        }
        .finish()
    }
}

/// Messages the JVM sends to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(u32),
    Run(String),
    ConRawOn,
    ConRawOff,
    ConCleanup(Vec<u8>),
    ConReqSize,
    ConTerm,
    /// Frames correctly but matches none of the known shapes above. Carries
    /// the raw payload so the caller can render the byte-escaped warning
    /// spec §4.6.1 calls for.
    Unknown(Vec<u8>),
}

impl Inbound {
    pub fn decode(payload: &[u8]) -> Self {
        if let Some(tail) = payload.strip_prefix(b"1") {
            return Inbound::Stdout(tail.to_vec());
        }
        if let Some(tail) = payload.strip_prefix(b"2") {
            return Inbound::Stderr(tail.to_vec());
        }
        if let Some(v) = try_exit(payload) {
            return v;
        }
        if let Some(v) = try_run(payload) {
            return v;
        }
        if payload == b"con-raw-on" {
            return Inbound::ConRawOn;
        }
        if payload == b"con-raw-off" {
            return Inbound::ConRawOff;
        }
        if let Some(tail) = payload.strip_prefix(b"con-cleanup ") {
            return Inbound::ConCleanup(tail.to_vec());
        }
        if payload == b"con-req-size" {
            return Inbound::ConReqSize;
        }
        if payload == b"con-term" {
            return Inbound::ConTerm;
        }
        Inbound::Unknown(payload.to_vec())
    }

    /// True for any message whose tag starts with `con-`, used by the
    /// event loop to decide whether an unrecognised message should be
    /// logged as a bad `con-*` message or a generically invalid one — the
    /// distinction the original source draws between `con_process_msg`'s
    /// fallback warning and `process_msg`'s (spec §4.6.1, §7).
    pub fn looks_like_console_message(payload: &[u8]) -> bool {
        payload.starts_with(b"con-")
    }
}

fn try_exit(payload: &[u8]) -> Option<Inbound> {
    let mut cur = Cursor::new(payload);
    cur.literal(b"exit ").ok()?;
    let status = cur.int().ok()?;
    cur.finish().ok()?;
    Some(Inbound::Exit(status))
}

fn try_run(payload: &[u8]) -> Option<Inbound> {
    let mut cur = Cursor::new(payload);
    cur.literal(b"run ").ok()?;
    let cmd = cur.string().ok()?;
    cur.finish().ok()?;
    Some(Inbound::Run(cmd))
}
