//! Cold-starts, detects, and stops the JVM server process (spec §4.3).
//! Reuses the teacher's `pre_exec`-before-`exec` idiom (seen in the
//! teacher's C++ handler, there installing a seccomp filter in the child)
//! for a different purpose here: making the freshly forked shell immune to
//! the signals that would otherwise hit it when the client's own terminal
//! state changes.

use crate::config::Config;
use crate::context::ClientContext;
use crate::error::ServerError;
use crate::rendezvous::{self, Lease};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use relayproto::Outbound;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No pid file: nothing has ever started a server here, or a previous
    /// [`sweep`](rendezvous::sweep) already cleaned up after a crash.
    Absent,
    /// A pid file exists but its contents don't parse as a pid.
    Unparseable,
    /// A pid file names a process that is no longer alive.
    Stale,
    Alive(i32),
}

pub fn detect(ctx: &ClientContext) -> ServerStatus {
    let contents = match std::fs::read_to_string(ctx.server_pid_path()) {
        Ok(c) => c,
        Err(_) => return ServerStatus::Absent,
    };
    let pid: i32 = match contents.trim().parse() {
        Ok(p) => p,
        Err(_) => return ServerStatus::Unparseable,
    };
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => ServerStatus::Alive(pid),
        Err(nix::errno::Errno::ESRCH) => ServerStatus::Stale,
        Err(_) => ServerStatus::Alive(pid),
    }
}

/// Forks the configured `startup` command, waits for slot 0's owner flag to
/// be cleared by the JVM (spec §4.3 "Cold start"), then leases it and sends
/// the one-time session setup (`idle_timeout`, `alias*`, `classpath*`).
pub fn cold_start(ctx: &ClientContext) -> Result<Lease, ServerError> {
    let config = Config::load(&ctx.config_path())?;
    rendezvous::sweep(ctx)?;
    rendezvous::create_slot(ctx, 0)?;

    let child = unsafe {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(&config.startup_cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .pre_exec(|| {
                signal::sigaction(
                    Signal::SIGHUP,
                    &signal::SigAction::new(
                        signal::SigHandler::SigIgn,
                        signal::SaFlags::empty(),
                        signal::SigSet::empty(),
                    ),
                )
                .map_err(std::io::Error::from)?;
                signal::sigaction(
                    Signal::SIGINT,
                    &signal::SigAction::new(
                        signal::SigHandler::SigIgn,
                        signal::SaFlags::empty(),
                        signal::SigSet::empty(),
                    ),
                )
                .map_err(std::io::Error::from)?;
                Ok(())
            })
            .spawn()
            .map_err(ServerError::Spawn)?
    };

    std::fs::write(ctx.server_pid_path(), child.id().to_string()).map_err(ServerError::Spawn)?;

    let owner_path = ctx.slot_path(0, "owner");
    let deadline = Instant::now() + STARTUP_TIMEOUT;
    while owner_path.exists() {
        if Instant::now() >= deadline {
            return Err(ServerError::StartupTimeout(STARTUP_TIMEOUT.as_secs()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let mut lease = rendezvous::grab(ctx)?;
    send(&mut lease, &Outbound::IdleTimeout(config.idle_timeout_minutes))?;
    for alias in &config.aliases {
        send(&mut lease, &Outbound::Alias(alias))?;
    }
    for classpath in &config.classpaths {
        send(&mut lease, &Outbound::Classpath(classpath))?;
    }
    lease.flush().map_err(|e| ServerError::Protocol(crate::error::ProtocolError::Write(e)))?;
    Ok(lease)
}

fn send(lease: &mut Lease, msg: &Outbound) -> Result<(), ServerError> {
    lease
        .send(msg)
        .map_err(|e| ServerError::Protocol(crate::error::ProtocolError::Write(e)))
}

/// Leases a slot solely to deliver `shutdown`, then waits for the server
/// process named in the pid file to exit (spec §4.3 "Stop").
pub fn stop(ctx: &ClientContext) -> Result<(), ServerError> {
    let pid = match detect(ctx) {
        ServerStatus::Alive(pid) => pid,
        _ => return Ok(()),
    };

    let mut lease = rendezvous::grab(ctx)?;
    send(&mut lease, &Outbound::Shutdown)?;
    lease.flush().map_err(|e| ServerError::Protocol(crate::error::ProtocolError::Write(e)))?;
    drop(lease);

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    loop {
        match signal::kill(Pid::from_raw(pid), None) {
            Err(nix::errno::Errno::ESRCH) => return Ok(()),
            _ => {}
        }
        if Instant::now() >= deadline {
            return Err(ServerError::ShutdownTimeout(SHUTDOWN_TIMEOUT.as_secs()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

pub fn restart(ctx: &ClientContext) -> Result<Lease, ServerError> {
    stop(ctx)?;
    cold_start(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx_in(dir: &TempDir) -> ClientContext {
        ClientContext {
            home: dir.path().to_path_buf(),
            app_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn detect_is_absent_with_no_pid_file() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        assert_eq!(detect(&ctx), ServerStatus::Absent);
    }

    #[test]
    fn detect_is_unparseable_with_garbage_pid_file() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        std::fs::create_dir_all(&ctx.app_dir).unwrap();
        std::fs::write(ctx.server_pid_path(), "not-a-pid").unwrap();
        assert_eq!(detect(&ctx), ServerStatus::Unparseable);
    }

    #[test]
    fn detect_is_stale_for_a_pid_that_cannot_exist() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        std::fs::create_dir_all(&ctx.app_dir).unwrap();
        // PID 1 is init and always alive in any container/namespace that can
        // run this test, so use a value picked to be implausibly large
        // instead of hardcoding a specific "known-dead" pid.
        std::fs::write(ctx.server_pid_path(), "2000000000").unwrap();
        assert_eq!(detect(&ctx), ServerStatus::Stale);
    }

    #[test]
    fn detect_is_alive_for_our_own_pid() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        std::fs::create_dir_all(&ctx.app_dir).unwrap();
        std::fs::write(ctx.server_pid_path(), std::process::id().to_string()).unwrap();
        assert_eq!(detect(&ctx), ServerStatus::Alive(std::process::id() as i32));
    }
}
