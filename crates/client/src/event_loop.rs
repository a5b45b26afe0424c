//! The single-threaded, blocking multiplexer over three inputs: stdin, a
//! SIGWINCH self-pipe, and the inbound FIFO, handled in that fixed order
//! within one iteration (spec §4.6). Uses raw `libc::poll` rather than a
//! safe wrapper — `nix`'s `poll` API has shifted shape across recent
//! releases, and the pack already shows precedent (zellij's raw `ioctl`
//! calls, the teacher's own `pre_exec` use) for dropping to `libc` directly
//! at exactly this kind of syscall boundary.

use crate::error::{ClientError, ProtocolError};
use crate::rendezvous::Lease;
use crate::subcommand;
use crate::terminal::TerminalController;
use relayproto::framing::MessageSource;
use relayproto::{Inbound, Outbound};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

const STDIN_CHUNK: usize = 4096;
const FATAL_REVENTS: i16 = libc::POLLERR | libc::POLLNVAL;

struct SelfPipe {
    read_end: UnixStream,
    _write_end_registration: signal_hook::SigId,
}

impl SelfPipe {
    fn install() -> Result<Self, ClientError> {
        let (read_end, write_end) = UnixStream::pair().map_err(ClientError::SignalPipe)?;
        read_end.set_nonblocking(true).map_err(ClientError::SignalPipe)?;
        let id = signal_hook::low_level::pipe::register(signal_hook::consts::SIGWINCH, write_end)
            .map_err(ClientError::SignalPipe)?;
        Ok(SelfPipe {
            read_end,
            _write_end_registration: id,
        })
    }

    /// Drains every byte currently buffered; one SIGWINCH or a hundred
    /// produce the same single drain (spec §5: "window-size notifications
    /// collapse").
    fn drain(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.read_end.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }
}

/// Runs the event loop to completion. Returns the process exit status the
/// JVM reported via `exit %i` (spec §4.6.1).
pub fn run(lease: &mut Lease, terminal: &mut TerminalController) -> Result<i32, ClientError> {
    lease.open_inbound().map_err(ClientError::Rendezvous)?;
    let mut self_pipe = SelfPipe::install()?;
    let mut stdin_open = true;
    let stdin = std::io::stdin();

    loop {
        let self_pipe_fd = self_pipe.read_end.as_raw_fd();
        let inbound_fd = lease.inbound_fd().expect("open_inbound was called above");
        let stdin_fd = stdin.as_raw_fd();

        // Order matches the dispatch order below: stdin, self-pipe, inbound.
        let mut fds = Vec::with_capacity(3);
        let stdin_index = if stdin_open {
            fds.push(pollfd(stdin_fd));
            Some(0usize)
        } else {
            None
        };
        let self_pipe_index = fds.len();
        fds.push(pollfd(self_pipe_fd));
        let inbound_index = fds.len();
        fds.push(pollfd(inbound_fd));

        let rv = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rv < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ClientError::Poll(err));
        }

        if let Some(idx) = stdin_index {
            let revents = fds[idx].revents;
            if revents & FATAL_REVENTS != 0 {
                return Err(ClientError::Stdin(std::io::Error::other(
                    "poll reported an error condition on stdin",
                )));
            }
            if revents & libc::POLLHUP != 0 {
                send_eof(lease)?;
                stdin_open = false;
            } else if revents & libc::POLLIN != 0 {
                let mut buf = [0u8; STDIN_CHUNK];
                let n = stdin_read(&mut buf).map_err(ClientError::Stdin)?;
                if n == 0 {
                    send_eof(lease)?;
                    stdin_open = false;
                } else {
                    lease
                        .send(&Outbound::StdinChunk(&buf[..n]))
                        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
                    lease
                        .flush()
                        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
                }
            }
        }

        let self_pipe_revents = fds[self_pipe_index].revents;
        if self_pipe_revents & (FATAL_REVENTS | libc::POLLHUP) != 0 {
            return Err(ClientError::SignalPipe(std::io::Error::other(
                "poll reported an error condition on the signal self-pipe",
            )));
        }
        if self_pipe_revents & libc::POLLIN != 0 {
            self_pipe.drain();
            notify_window_size(lease, terminal)?;
        }

        let inbound_revents = fds[inbound_index].revents;
        if inbound_revents & libc::POLLHUP != 0 {
            return Err(ClientError::Protocol(ProtocolError::HungUp));
        }
        if inbound_revents & libc::POLLIN != 0 {
            while {
                let payload = relayproto::framing::read_message(lease)
                    .map_err(|e| ClientError::Protocol(ProtocolError::Read(e)))?;
                if let Some(code) = dispatch(&payload, lease, terminal)? {
                    return Ok(code);
                }
                !lease.read_buffer_exhausted()
            } {}
        }
    }
}

fn send_eof(lease: &mut Lease) -> Result<(), ClientError> {
    lease
        .send(&Outbound::Eof)
        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
    lease
        .flush()
        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))
}

fn notify_window_size(lease: &mut Lease, terminal: &TerminalController) -> Result<(), ClientError> {
    let (cols, rows) = terminal.window_size().map_err(ClientError::Terminal)?;
    lease
        .send(&Outbound::ConSize {
            cols: cols as u32,
            rows: rows as u32,
        })
        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
    lease
        .flush()
        .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))
}

fn stdin_read(buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match std::io::stdin().read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

/// Handles one decoded inbound message. Returns `Some(code)` once an `exit`
/// message has been seen, signalling the loop to stop.
fn dispatch(
    payload: &[u8],
    lease: &mut Lease,
    terminal: &mut TerminalController,
) -> Result<Option<i32>, ClientError> {
    match Inbound::decode(payload) {
        Inbound::Stdout(bytes) => {
            let _ = std::io::stdout().write_all(&bytes);
            let _ = std::io::stdout().flush();
        }
        Inbound::Stderr(bytes) => {
            let _ = std::io::stderr().write_all(&bytes);
            let _ = std::io::stderr().flush();
        }
        Inbound::Exit(code) => return Ok(Some(code as i32)),
        Inbound::Run(cmdline) => {
            let outcome = subcommand::run(&cmdline);
            lease
                .send(&outcome.to_outbound())
                .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
            lease
                .flush()
                .map_err(|e| ClientError::Protocol(ProtocolError::Write(e)))?;
        }
        Inbound::ConRawOn => terminal.raw_on().map_err(ClientError::Terminal)?,
        Inbound::ConRawOff => terminal.raw_off(),
        Inbound::ConCleanup(bytes) => terminal.set_cleanup(bytes),
        Inbound::ConReqSize => notify_window_size(lease, terminal)?,
        Inbound::ConTerm => terminal.terminate(),
        Inbound::Unknown(bytes) => {
            if Inbound::looks_like_console_message(&bytes) {
                log::warn!("unrecognized console message: {}", escape(&bytes));
            } else {
                log::warn!("unrecognized message from server: {}", escape(&bytes));
            }
        }
    }
    Ok(None)
}

/// Renders arbitrary bytes for a warning line: printable ASCII passes
/// through, everything else becomes `\xNN` (spec §4.6.1, §7).
fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn escapes_non_printable_bytes() {
        assert_eq!(escape(b"ok\x01\xff"), "ok\\x01\\xff");
    }

    #[test]
    fn leaves_printable_ascii_untouched() {
        assert_eq!(escape(b"con-bogus arg"), "con-bogus arg");
    }
}
