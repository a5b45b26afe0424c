//! Per-concern error enums plus the top-level aggregate `main` maps to an
//! exit code, mirroring the teacher's `HandlerError -> JudgeResult`
//! conversion shape (`crates/agent/src/handler/mod.rs` in the teacher repo)
//! — here the "reply" `ClientError` converts to is a process exit code
//! instead of a wire message, since a misbehaving client has no peer left
//! to tell.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't open config file {0}: {1}")]
    Open(PathBuf, #[source] std::io::Error),
    #[error("bad config line: {0}")]
    BadLine(String),
    #[error("more than one 'startup' line specified in config")]
    DuplicateStartup,
    #[error("more than one 'idle_timeout' line specified in config")]
    DuplicateIdleTimeout,
    #[error("invalid idle_timeout line: {0}")]
    InvalidIdleTimeout(String),
    #[error("no 'startup' command specified in config file")]
    MissingStartup,
}

#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    #[error("failed to create owner flag {0}: {1}")]
    CreateOwnerFlag(PathBuf, #[source] std::io::Error),
    #[error("failed to create named pipe {0}: {1}")]
    CreateFifo(PathBuf, #[source] std::io::Error),
    #[error("unable to open pipe for writing {0}: {1}")]
    OpenForWrite(PathBuf, #[source] std::io::Error),
    #[error("unable to open pipe for reading {0}: {1}")]
    OpenForRead(PathBuf, #[source] std::io::Error),
    #[error("all proxies are in use")]
    AllProxiesInUse,
    #[error("failed to sweep rendezvous directory: {0}")]
    Sweep(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("HOME environment variable is not set")]
    MissingHome,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),
    #[error("failed to fork/exec JVM startup command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("server did not start up after {0} seconds")]
    StartupTimeout(u64),
    #[error("server did not respond to shutdown after {0} seconds")]
    ShutdownTimeout(u64),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("input is not a terminal")]
    NotATty,
    #[error("can't get terminal attributes: {0}")]
    GetAttr(#[source] std::io::Error),
    #[error("can't set terminal attributes: {0}")]
    SetAttr(#[source] std::io::Error),
    #[error("can't read terminal size: {0}")]
    GetSize(#[source] std::io::Error),
    #[error("can't set up SIGWINCH handler: {0}")]
    SignalSetup(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("end of file on input named pipe")]
    Eof,
    #[error("read error on named pipe: {0}")]
    Read(#[source] std::io::Error),
    #[error("write error on named pipe: {0}")]
    Write(#[source] std::io::Error),
    #[error("java process hung up pipe")]
    HungUp,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Rendezvous(#[from] RendezvousError),
    #[error("{0}")]
    Server(#[from] ServerError),
    #[error("{0}")]
    Terminal(#[from] TerminalError),
    #[error("{0}")]
    Protocol(#[from] ProtocolError),
    #[error("current working directory too long or unreadable: {0}")]
    Cwd(#[source] std::io::Error),
    #[error("error on stdin: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("call to poll failed: {0}")]
    Poll(#[source] std::io::Error),
    #[error("unable to create internal signal pipe: {0}")]
    SignalPipe(#[source] std::io::Error),
    #[error("usage: missing tool name or alias")]
    Usage,
}
