//! Explicit replacement for the original source's process-global state
//! (spec §9, design note 1). `ClientContext` is constructed once in `main`
//! and passed by reference everywhere; it owns no file descriptors itself.
//! The two external resources that do need guaranteed release — the
//! rendezvous [`crate::rendezvous::Lease`] and the
//! [`crate::terminal::TerminalController`] — are separate scoped values
//! with their own `Drop` impls, held locally by whichever function needs
//! them.

use std::path::PathBuf;

pub const APP_NAME: &str = "vmrelay";
pub const ALIAS_PREFIX: &str = "vr-";

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub home: PathBuf,
    pub app_dir: PathBuf,
}

impl ClientContext {
    pub fn from_env() -> Result<Self, crate::error::ServerError> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or(crate::error::ServerError::MissingHome)?;
        let app_dir = home.join(format!(".{APP_NAME}"));
        Ok(Self { home, app_dir })
    }

    pub fn slot_path(&self, slot: u32, kind: &str) -> PathBuf {
        self.app_dir.join(format!("{slot}-{kind}"))
    }

    pub fn server_pid_path(&self) -> PathBuf {
        self.app_dir.join("server.pid")
    }

    pub fn config_path(&self) -> PathBuf {
        self.app_dir.join("config")
    }
}
