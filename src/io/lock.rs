//! Single-instance lock file.
//!
//! Two sessions driving the same camera would interleave settings and
//! captures, so a session holds an exclusive `fs2` lock on
//! `$XDG_RUNTIME_DIR/nightlapse.lock` (or `/tmp`) for its whole run. The
//! lock file records the holder's PID and camera port.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::LOCK_FILE_NAME;

/// Directory holding the lock file.
pub fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn default_lock_path() -> PathBuf {
    runtime_dir().join(LOCK_FILE_NAME)
}

/// An acquired instance lock. Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock at `path`, failing if another process holds it.
    pub fn acquire(path: &Path, port: Option<&str>) -> Result<Self> {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            let holder = std::fs::read_to_string(path).unwrap_or_default();
            match holder.lines().next().filter(|pid| !pid.trim().is_empty()) {
                Some(pid) => anyhow::bail!("nightlapse is already running (PID: {})", pid.trim()),
                None => anyhow::bail!("nightlapse is already running"),
            }
        }

        // Lock held: replace whatever a previous holder left behind
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        writeln!(file, "{}", port.unwrap_or(""))?;
        file.flush()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and remove the lock file.
    pub fn release(self) -> Result<()> {
        FileExt::unlock(&self.file).context("Failed to unlock lock file")?;
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove lock file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_records_pid_and_port() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        let lock = InstanceLock::acquire(&path, Some("usb:001,004")).unwrap();

        let content = std::fs::read_to_string(lock.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![std::process::id().to_string().as_str(), "usb:001,004"]);

        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        let _lock = InstanceLock::acquire(&path, None).unwrap();

        let err = InstanceLock::acquire(&path, None).unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_lock_can_be_retaken_after_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        drop(InstanceLock::acquire(&path, None).unwrap());
        InstanceLock::acquire(&path, None).unwrap().release().unwrap();
    }
}
