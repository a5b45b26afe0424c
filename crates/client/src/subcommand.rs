//! In-band execution of `run <cmdline>` requests from the JVM (spec
//! §4.6.1): run the command through `/bin/sh -c`, classify how it ended,
//! and reply with `run-status`. A subcommand failure is never a
//! [`crate::error::ClientError`] — it's data the caller turns into a wire
//! reply (spec §7: "Subcommand errors ... not a client error").

use relayproto::Outbound;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

/// The four-way classification from spec §4.6.1's `run-status` table,
/// split out from the actual `Command` spawn so it can be unit-tested
/// against synthetic exit statuses without forking anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    SpawnFailed { errno: i32 },
    Exited { code: i32 },
    KilledByIntOrQuit { signal: i32 },
    KilledBySignal { signal: i32 },
    Other,
}

impl RunOutcome {
    pub fn classify_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return RunOutcome::Exited { code };
        }
        if let Some(signal) = status.signal() {
            if signal == libc::SIGINT || signal == libc::SIGQUIT {
                return RunOutcome::KilledByIntOrQuit { signal };
            }
            return RunOutcome::KilledBySignal { signal };
        }
        RunOutcome::Other
    }

    pub fn to_outbound(self) -> Outbound<'static> {
        let (kind, code) = match self {
            RunOutcome::SpawnFailed { errno } => (-1, errno as u32),
            RunOutcome::Exited { code } => (0, code as u32),
            RunOutcome::KilledByIntOrQuit { signal } => (1, signal as u32),
            RunOutcome::KilledBySignal { signal } => (2, signal as u32),
            RunOutcome::Other => (3, 0),
        };
        Outbound::RunStatus { kind, code }
    }
}

/// Runs `cmdline` through `/bin/sh -c` and blocks until it completes —
/// matching spec §5's "single OS thread" model, the event loop is simply
/// not responsive while this runs, which is the specified behavior.
pub fn run(cmdline: &str) -> RunOutcome {
    match Command::new("/bin/sh").arg("-c").arg(cmdline).status() {
        Ok(status) => RunOutcome::classify_status(status),
        Err(e) => RunOutcome::SpawnFailed {
            errno: e.raw_os_error().unwrap_or(0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_command_reports_exit_zero() {
        let outcome = run("true");
        assert_eq!(outcome, RunOutcome::Exited { code: 0 });
    }

    #[test]
    fn false_command_reports_exit_one() {
        let outcome = run("false");
        assert_eq!(outcome, RunOutcome::Exited { code: 1 });
    }

    #[test]
    fn killed_by_sigterm_is_kind_two() {
        let outcome = run("kill -TERM $$");
        match outcome {
            RunOutcome::KilledBySignal { signal } => assert_eq!(signal, libc::SIGTERM),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn spawn_failure_encodes_as_kind_minus_one() {
        let outcome = RunOutcome::SpawnFailed { errno: libc::ENOENT };
        assert_eq!(
            outcome.to_outbound(),
            Outbound::RunStatus {
                kind: -1,
                code: libc::ENOENT as u32
            }
        );
    }

    #[test]
    fn exited_encodes_as_kind_zero() {
        let outcome = RunOutcome::Exited { code: 1 };
        assert_eq!(outcome.to_outbound(), Outbound::RunStatus { kind: 0, code: 1 });
    }
}
