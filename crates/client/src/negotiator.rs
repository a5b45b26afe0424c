//! Transmits the invocation context as an ordered sequence of messages
//! (spec §4.4). Ordering is part of the wire contract — the JVM treats the
//! sequence `classpath*, arg*, env*, cwd, run` as one invocation record —
//! so this is the single place that ordering is allowed to be decided.

use crate::error::ClientError;
use crate::rendezvous::Lease;
use relayproto::Outbound;

pub struct Invocation<'a> {
    pub classpaths: &'a [String],
    pub args: &'a [String],
    /// `KEY=VALUE` strings, already reassembled from the process
    /// environment by the caller (spec §4.4 step 3) — threaded in rather
    /// than read from `std::env` here, so ordering can be tested against a
    /// fixed environment instead of whatever happens to be set in the test
    /// process.
    pub envs: &'a [String],
    pub cwd: &'a str,
    pub run: &'a str,
}

/// Gathers the current process environment as `KEY=VALUE` strings, in the
/// order `std::env::vars_os` yields them.
pub fn current_process_envs() -> Vec<String> {
    std::env::vars_os()
        .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
        .collect()
}

pub fn negotiate(lease: &mut Lease, invocation: &Invocation) -> Result<(), ClientError> {
    for path in invocation.classpaths {
        send(lease, &Outbound::Classpath(path))?;
    }
    for arg in invocation.args {
        send(lease, &Outbound::Arg(arg))?;
    }
    for kv in invocation.envs {
        send(lease, &Outbound::Env(kv))?;
    }
    send(lease, &Outbound::Cwd(invocation.cwd))?;
    send(lease, &Outbound::Run(invocation.run))?;
    lease
        .flush()
        .map_err(|e| ClientError::Protocol(crate::error::ProtocolError::Write(e)))
}

fn send(lease: &mut Lease, msg: &Outbound) -> Result<(), ClientError> {
    lease
        .send(msg)
        .map_err(|e| ClientError::Protocol(crate::error::ProtocolError::Write(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ClientContext;
    use crate::rendezvous;
    use tempfile::TempDir;

    /// Captures the sequence of message tags a real `Lease::send` would
    /// have written, without needing a live JVM peer on the other end of
    /// the FIFO — grab a real lease against a scratch directory and read
    /// back what landed in `<k>-in` is exercised instead in
    /// `rendezvous::tests`; here we only need to assert *ordering*, so we
    /// decode the encoded payload tags directly.
    #[test]
    fn orders_classpath_then_arg_then_env_then_cwd_then_run() {
        let dir = TempDir::new().unwrap();
        let ctx = ClientContext {
            home: dir.path().to_path_buf(),
            app_dir: dir.path().to_path_buf(),
        };
        rendezvous::create_slot(&ctx, 0).unwrap();
        std::fs::write(ctx.slot_path(0, "owner"), "").unwrap();
        std::fs::remove_file(ctx.slot_path(0, "owner")).unwrap();

        // Open the inbound side ourselves so the write side below doesn't
        // block forever on FIFO open semantics.
        let in_path = ctx.slot_path(0, "in");
        let reader_handle = {
            let path = in_path.clone();
            std::thread::spawn(move || {
                std::fs::read(path).unwrap_or_default()
            })
        };

        let mut lease = rendezvous::grab(&ctx).unwrap();
        let invocation = Invocation {
            classpaths: &["/tmp/x.jar".to_string()],
            args: &["bar".to_string()],
            envs: &["HOME=/home/u".to_string()],
            cwd: "/tmp",
            run: "foo",
        };
        negotiate(&mut lease, &invocation).unwrap();
        drop(lease);

        let written = reader_handle.join().unwrap();
        let text = String::from_utf8_lossy(&written);
        let classpath_pos = text.find("classpath ").unwrap();
        let arg_pos = text.find("arg ").unwrap();
        let cwd_pos = text.find("cwd ").unwrap();
        let run_pos = text.find("run ").unwrap();
        assert!(classpath_pos < arg_pos);
        assert!(arg_pos < cwd_pos);
        assert!(cwd_pos < run_pos);
    }
}
