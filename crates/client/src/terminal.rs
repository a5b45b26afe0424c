//! Scoped acquisition of the controlling terminal with guaranteed restore
//! on every exit path (spec §4.5). `TerminalController` owns the saved
//! `termios` and the cleanup string as a value with a `Drop` impl, the
//! concretization of spec §9's "own the two external resources as scoped
//! values whose destructors guarantee release" design note.

use crate::error::TerminalError;
use nix::sys::termios::{self, SetArg, Termios};
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};

pub struct TerminalController {
    saved: Option<Termios>,
    cleanup: Vec<u8>,
    raw: bool,
}

impl TerminalController {
    pub fn new() -> Self {
        Self {
            saved: None,
            cleanup: Vec::new(),
            raw: false,
        }
    }

    /// `con-raw-on`: idempotent once raw mode is active.
    pub fn raw_on(&mut self) -> Result<(), TerminalError> {
        if self.raw {
            return Ok(());
        }
        let stdin = std::io::stdin();
        let fd = stdin.as_raw_fd();
        if unsafe { libc::isatty(fd) } == 0 {
            return Err(TerminalError::NotATty);
        }
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let original = termios::tcgetattr(borrowed).map_err(|e| TerminalError::GetAttr(e.into()))?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(borrowed, SetArg::TCSANOW, &raw)
            .map_err(|e| TerminalError::SetAttr(e.into()))?;
        self.saved = Some(original);
        self.raw = true;
        Ok(())
    }

    /// `con-raw-off`.
    pub fn raw_off(&mut self) {
        if !self.raw {
            return;
        }
        if let Some(saved) = &self.saved {
            let stdin = std::io::stdin();
            let borrowed = unsafe { BorrowedFd::borrow_raw(stdin.as_raw_fd()) };
            if let Err(e) = termios::tcsetattr(borrowed, SetArg::TCSANOW, saved) {
                log::warn!("can't restore terminal settings: {e}");
            }
        }
        self.raw = false;
    }

    /// `con-cleanup %t`: replaces the stored cleanup string.
    pub fn set_cleanup(&mut self, bytes: Vec<u8>) {
        self.cleanup = bytes;
    }

    /// `con-req-size`: current window size via `TIOCGWINSZ`. Uses a direct
    /// `libc::ioctl` call rather than a `nix` wrapper — the same
    /// drop-to-libc-for-one-syscall pattern the pack shows for the
    /// analogous `TIOCSWINSZ` call (zellij's `os_input_output.rs`).
    pub fn window_size(&self) -> Result<(u16, u16), TerminalError> {
        #[repr(C)]
        #[derive(Default)]
        struct Winsize {
            ws_row: u16,
            ws_col: u16,
            ws_xpixel: u16,
            ws_ypixel: u16,
        }
        let mut ws = Winsize::default();
        let rv = unsafe { libc::ioctl(0, libc::TIOCGWINSZ, &mut ws) };
        if rv != 0 {
            return Err(TerminalError::GetSize(std::io::Error::last_os_error()));
        }
        Ok((ws.ws_col, ws.ws_row))
    }

    /// `con-term`, and the same logic run automatically at process exit
    /// (spec §4.5, invariant 4 in spec §8): restore termios if still raw,
    /// then emit the cleanup string to stdout.
    pub fn terminate(&mut self) {
        self.raw_off();
        if !self.cleanup.is_empty() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&self.cleanup);
            let _ = stdout.flush();
        }
        self.cleanup.clear();
    }
}

impl Default for TerminalController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalController {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_raw_with_empty_cleanup() {
        let ctrl = TerminalController::new();
        assert!(!ctrl.raw);
        assert!(ctrl.cleanup.is_empty());
    }

    #[test]
    fn raw_off_without_ever_going_raw_is_a_no_op() {
        let mut ctrl = TerminalController::new();
        ctrl.raw_off();
        assert!(!ctrl.raw);
    }

    #[test]
    fn set_cleanup_replaces_previous_value() {
        let mut ctrl = TerminalController::new();
        ctrl.set_cleanup(b"\x1b[0m".to_vec());
        ctrl.set_cleanup(b"\x1b[1m".to_vec());
        assert_eq!(ctrl.cleanup, b"\x1b[1m");
    }
}
