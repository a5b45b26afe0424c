//! The numbered-slot FIFO+owner-flag filesystem layout (spec §4.2). Slot
//! allocation races are resolved by the append-and-readback protocol: this
//! relies on POSIX append atomicity on a local filesystem and is not safe
//! on network filesystems (spec §9, design note "Race-on-append lease") —
//! do not "fix" this with locks without first measuring a real failure.

use crate::context::ClientContext;
use crate::error::RendezvousError;
use relayproto::framing::MessageSource;
use relayproto::{Outbound, framing};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

pub const MIN_FREE_PROXIES: u32 = 4;
const OWNER_MODE: u32 = 0o600;
const FIFO_MODE: u32 = 0o600;
const IN_BUF_SIZE: usize = 1024;

/// Creates `<k>-owner` (mode 0600) first, then `<k>-in` and `<k>-out` as
/// FIFOs — the owner flag existing (even empty) is what blocks clients from
/// leasing a slot the JVM hasn't finished wiring up yet.
pub fn create_slot(ctx: &ClientContext, slot: u32) -> Result<(), RendezvousError> {
    let owner = ctx.slot_path(slot, "owner");
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(OWNER_MODE)
        .open(&owner)
        .map_err(|e| RendezvousError::CreateOwnerFlag(owner.clone(), e))?;

    let in_path = ctx.slot_path(slot, "in");
    make_fifo(&in_path)?;
    let out_path = ctx.slot_path(slot, "out");
    make_fifo(&out_path)?;
    Ok(())
}

fn make_fifo(path: &std::path::Path) -> Result<(), RendezvousError> {
    use nix::sys::stat::Mode;
    nix::unistd::mkfifo(path, Mode::from_bits_truncate(FIFO_MODE))
        .map_err(|e| RendezvousError::CreateFifo(path.to_path_buf(), std::io::Error::from(e)))
}

/// Deletes every `*.pid`, `*-in`, `*-out`, `*-owner` entry in the rendezvous
/// directory. Run once at server cold start, before slot 0 is created —
/// residue from a crashed previous run is never valid (spec §4.2).
pub fn sweep(ctx: &ClientContext) -> Result<(), RendezvousError> {
    let entries = match std::fs::read_dir(&ctx.app_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(&ctx.app_dir).map_err(RendezvousError::Sweep)?;
            return Ok(());
        }
        Err(e) => return Err(RendezvousError::Sweep(e)),
    };
    for entry in entries {
        let entry = entry.map_err(RendezvousError::Sweep)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".pid") || name.ends_with("-in") || name.ends_with("-out") || name.ends_with("-owner") {
            std::fs::remove_file(entry.path()).map_err(RendezvousError::Sweep)?;
        }
    }
    Ok(())
}

/// A client's exclusive hold on a slot: the pairing of (slot index, this
/// process's PID, open write handle to `<k>-in`, lazily-opened read handle
/// to `<k>-out`). Released on drop — handles are closed, the slot itself is
/// never unlinked (spec §4.2 "Release").
#[derive(Debug)]
pub struct Lease {
    ctx: ClientContext,
    slot: u32,
    writer: BufWriter<File>,
    reader: Option<BufReader<File>>,
    read_carry: Vec<u8>,
    read_pos: usize,
    read_len: usize,
}

impl Lease {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Opens `<k>-out` for reading. Must be called only after the first
    /// message has been written and flushed — opening a FIFO for read
    /// blocks until a writer appears, and the JVM only opens its write end
    /// once it sees a request (spec §4.2 "Lazy inbound open").
    pub fn open_inbound(&mut self) -> Result<(), RendezvousError> {
        if self.reader.is_some() {
            return Ok(());
        }
        let path = self.ctx.slot_path(self.slot, "out");
        let file = File::open(&path).map_err(|e| RendezvousError::OpenForRead(path, e))?;
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    pub fn send(&mut self, msg: &Outbound) -> std::io::Result<()> {
        self.writer.write_all(&framing::encode_message(&msg.encode()))
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl MessageSource for Lease {
    fn next_byte(&mut self) -> std::io::Result<u8> {
        loop {
            if self.read_pos < self.read_len {
                let b = self.read_carry[self.read_pos];
                self.read_pos += 1;
                return Ok(b);
            }
            let reader = self
                .reader
                .as_mut()
                .expect("open_inbound must be called before reading");
            if self.read_carry.len() < IN_BUF_SIZE {
                self.read_carry.resize(IN_BUF_SIZE, 0);
            }
            match reader.read(&mut self.read_carry) {
                Ok(0) => return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)),
                Ok(n) => {
                    self.read_len = n;
                    self.read_pos = 0;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.next_byte()?;
        }
        Ok(())
    }
}

impl Lease {
    /// True once every byte of the most recent kernel read has been
    /// consumed — the event loop uses this to decide whether to keep
    /// draining messages or return to `poll` (spec §4.6: "read messages
    /// repeatedly until the small read buffer is exhausted").
    pub fn read_buffer_exhausted(&self) -> bool {
        self.read_pos >= self.read_len
    }

    pub fn inbound_fd(&self) -> Option<std::os::fd::RawFd> {
        use std::os::fd::AsRawFd;
        self.reader.as_ref().map(|r| r.get_ref().as_raw_fd())
    }
}

/// Scans slots `0, 1, 2, ...` until one is found whose `<k>-owner` is
/// absent, wins the lease via append-and-readback, then tops up the pool
/// to keep at least [`MIN_FREE_PROXIES`] slots free by creating more and
/// announcing them with `new_proxy` on the freshly won lease (spec §4.2).
pub fn grab(ctx: &ClientContext) -> Result<Lease, RendezvousError> {
    let pid = std::process::id();
    let mut free_count: u32 = 0;
    let mut n_proxies: u32 = 0;
    let mut won: Option<(u32, File)> = None;

    let mut slot = 0u32;
    loop {
        let in_path = ctx.slot_path(slot, "in");
        if !in_path.exists() {
            n_proxies = slot;
            break;
        }
        let owner_path = ctx.slot_path(slot, "owner");
        if owner_path.exists() {
            slot += 1;
            continue;
        }
        if won.is_some() {
            free_count += 1;
            slot += 1;
            continue;
        }
        if let Some(writer) = try_win_slot(&owner_path, &ctx.slot_path(slot, "in"), pid)? {
            won = Some((slot, writer));
        }
        slot += 1;
    }

    let (slot, file) = won.ok_or(RendezvousError::AllProxiesInUse)?;
    let mut lease = Lease {
        ctx: ctx.clone(),
        slot,
        writer: BufWriter::new(file),
        reader: None,
        read_carry: Vec::new(),
        read_pos: 0,
        read_len: 0,
    };

    let in_use = n_proxies.saturating_sub(free_count);
    let mut total = n_proxies;
    while in_use + MIN_FREE_PROXIES > total {
        let new_slot = total;
        total += 1;
        create_slot(ctx, new_slot)?;
        lease
            .send(&Outbound::NewProxy(new_slot))
            .map_err(|e| RendezvousError::OpenForWrite(ctx.slot_path(new_slot, "in"), e))?;
    }

    Ok(lease)
}

/// Appends this process's PID to the owner file, then reads the first line
/// back; if it's still our PID, no other client raced ahead, and we open
/// `<k>-in` for writing. Returns `Ok(None)` if we lost the race.
fn try_win_slot(
    owner_path: &std::path::Path,
    in_path: &std::path::Path,
    pid: u32,
) -> Result<Option<File>, RendezvousError> {
    {
        let mut append = OpenOptions::new()
            .append(true)
            .create(true)
            .open(owner_path)
            .map_err(|e| RendezvousError::CreateOwnerFlag(owner_path.to_path_buf(), e))?;
        writeln!(append, "{pid}").map_err(|e| RendezvousError::CreateOwnerFlag(owner_path.to_path_buf(), e))?;
    }

    let recorded = {
        let mut contents = String::new();
        File::open(owner_path)
            .map_err(|e| RendezvousError::OpenForRead(owner_path.to_path_buf(), e))?
            .read_to_string(&mut contents)
            .map_err(|e| RendezvousError::OpenForRead(owner_path.to_path_buf(), e))?;
        contents
            .lines()
            .next()
            .and_then(|l| l.trim().parse::<u32>().ok())
    };

    if recorded != Some(pid) {
        return Ok(None);
    }

    let file = OpenOptions::new()
        .write(true)
        .open(in_path)
        .map_err(|e| RendezvousError::OpenForWrite(in_path.to_path_buf(), e))?;
    Ok(Some(file))
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
    fn create_slot_makes_owner_then_fifos() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        create_slot(&ctx, 0).unwrap();
        assert!(ctx.slot_path(0, "owner").exists());
        assert!(ctx.slot_path(0, "in").exists());
        assert!(ctx.slot_path(0, "out").exists());
    }

    #[test]
    fn sweep_removes_residue_but_not_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        create_slot(&ctx, 0).unwrap();
        std::fs::write(ctx.server_pid_path(), "1234").unwrap();
        std::fs::write(ctx.app_dir.join("config"), "startup foo").unwrap();
        sweep(&ctx).unwrap();
        assert!(!ctx.slot_path(0, "owner").exists());
        assert!(!ctx.server_pid_path().exists());
        assert!(ctx.app_dir.join("config").exists());
    }

    #[test]
    fn grab_fails_when_no_free_slot_exists() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        // Slot 0 exists with an owner present (busy), and nothing past it —
        // n_proxies becomes 1 and there is no free slot to win.
        create_slot(&ctx, 0).unwrap();
        std::fs::write(ctx.slot_path(0, "owner"), "9999\n").unwrap();
        let err = grab(&ctx).unwrap_err();
        assert!(matches!(err, RendezvousError::AllProxiesInUse));
    }

    #[test]
    fn try_win_slot_loses_race_when_another_pid_appended_first() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx_in(&dir);
        create_slot(&ctx, 0).unwrap();
        let owner = ctx.slot_path(0, "owner");
        std::fs::write(&owner, "1\n").unwrap();
        let result = try_win_slot(&owner, &ctx.slot_path(0, "in"), 2).unwrap();
        assert!(result.is_none());
        let contents = std::fs::read_to_string(&owner).unwrap();
        assert_eq!(contents.lines().next(), Some("1"));
    }
}
