//! Advisory PID file lock preventing two daemons for the same user

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("trenew is already running (pid {}, lock {})", pid.map_or_else(|| "unknown".to_string(), |p| p.to_string()), path.display())]
    AlreadyRunning { path: PathBuf, pid: Option<u32> },
    #[error("cannot use pid file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive `flock` on the PID file, held for the life of the value.
///
/// The lock follows the open file across `fork`, so it may be taken before
/// detaching and the pid rewritten afterwards with [`PidLock::record_pid`].
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    file: File,
}

impl PidLock {
    pub fn acquire(path: &Path) -> Result<Self, PidFileError> {
        let io_err = |source: io::Error| PidFileError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(io_err)?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(errno) if errno == Errno::EWOULDBLOCK => {
                let mut contents = String::new();
                let _ = file.read_to_string(&mut contents);
                return Err(PidFileError::AlreadyRunning {
                    path: path.to_path_buf(),
                    pid: contents.trim().parse().ok(),
                });
            }
            Err(errno) => return Err(io_err(io::Error::from(errno))),
        }

        let mut lock = Self {
            path: path.to_path_buf(),
            file,
        };
        lock.record_pid()?;
        Ok(lock)
    }

    /// Overwrite the file with the current process id
    pub fn record_pid(&mut self) -> Result<(), PidFileError> {
        let path = self.path.clone();
        let io_err = |source: io::Error| PidFileError::Io {
            path: path.clone(),
            source,
        };

        self.file.set_len(0).map_err(&io_err)?;
        self.file.seek(SeekFrom::Start(0)).map_err(&io_err)?;
        writeln!(self.file, "{}", std::process::id()).map_err(&io_err)?;
        self.file.sync_all().map_err(&io_err)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
