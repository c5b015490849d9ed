use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{Result, StagehandError};
use crate::submit::Submitter;

/// Exclusive advisory lock over the queue, held for the whole
/// read-decide-write sequence of every queue operation. The lock lives on
/// a sidecar `<queue>.lock` file so the queue itself can be replaced by
/// rename without changing the locked inode. Released on drop, so every
/// exit path (including a failing submit collaborator) lets it go.
struct QueueLock {
    file: File,
}

impl QueueLock {
    fn acquire(queue_path: &Path) -> Result<Self> {
        let mut lock_path = queue_path.as_os_str().to_os_string();
        lock_path.push(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|source| StagehandError::QueueIo {
                path: PathBuf::from(&lock_path),
                source,
            })?;
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(StagehandError::QueueIo {
                path: PathBuf::from(&lock_path),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(Self { file })
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// What one drain cycle did: the commands handed to the submitter, in
/// queue order, and how many entries the queue still holds.
#[derive(Debug)]
pub struct DrainReport {
    pub submitted: Vec<String>,
    pub remaining: usize,
}

/// Persistent FIFO of submittable command strings, one per line.
///
/// Enqueue suppresses exact textual duplicates; drain submits a prefix of
/// the queue and rewrites the remainder in its original order. Identity is
/// the exact command text, so the file needs no escaping, which is also
/// why a command containing a newline is rejected outright.
pub struct JobQueue {
    path: PathBuf,
}

impl JobQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StagehandError {
        StagehandError::QueueIo {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the queue contents. Caller must hold the lock.
    fn read_entries(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_err(err)),
        }
    }

    /// Replace the queue contents atomically (temp file + rename), so an
    /// interrupted rewrite can never truncate the queue.
    fn rewrite(&self, remaining: &[String]) -> Result<()> {
        let mut tmp_path = self.path.as_os_str().to_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        let mut tmp = File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        for entry in remaining {
            writeln!(tmp, "{}", entry).map_err(|e| self.io_err(e))?;
        }
        tmp.sync_all().map_err(|e| self.io_err(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))
    }

    /// Current entries in FIFO order.
    pub fn entries(&self) -> Result<Vec<String>> {
        let _lock = QueueLock::acquire(&self.path)?;
        self.read_entries()
    }

    /// Append a command unless an identical one is already queued.
    /// Returns `false` when the duplicate was suppressed.
    pub fn enqueue(&self, command: &str) -> Result<bool> {
        if command.contains('\n') {
            return Err(StagehandError::CommandNotQueueable(command.to_string()));
        }
        let _lock = QueueLock::acquire(&self.path)?;
        let entries = self.read_entries()?;
        if entries.iter().any(|entry| entry == command) {
            tracing::debug!(command, "duplicate suppressed");
            return Ok(false);
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(file, "{}", command).map_err(|e| self.io_err(e))?;
        tracing::info!(command, "queued");
        Ok(true)
    }

    /// Submit the first `limit` entries in order and rewrite the queue to
    /// hold exactly the rest. `limit == 0` touches nothing.
    ///
    /// If the submitter fails, the failed entry and everything after it
    /// are written back before the error propagates: no entry is lost,
    /// reordered, or duplicated across a drain, whatever the exit path.
    pub fn drain(&self, limit: usize, submitter: &mut dyn Submitter) -> Result<DrainReport> {
        let _lock = QueueLock::acquire(&self.path)?;
        let entries = self.read_entries()?;
        if limit == 0 {
            return Ok(DrainReport {
                submitted: Vec::new(),
                remaining: entries.len(),
            });
        }
        let cut = limit.min(entries.len());
        let mut submitted = Vec::with_capacity(cut);
        for (idx, entry) in entries.iter().take(cut).enumerate() {
            if let Err(err) = submitter.submit(entry) {
                self.rewrite(&entries[idx..])?;
                return Err(err);
            }
            submitted.push(entry.clone());
        }
        self.rewrite(&entries[cut..])?;
        Ok(DrainReport {
            submitted,
            remaining: entries.len() - cut,
        })
    }
}
