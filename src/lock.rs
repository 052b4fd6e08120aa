//! Modem lock file
//!
//! Other services poll this file to learn that the modem is going away on
//! purpose. It holds our pid and is removed when the guard is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Holds the lock file for its lifetime
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Create the lock file, and its directory if needed
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, std::process::id().to_string())?;
        log::debug!("Created lock file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed lock file {}", self.path.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_holds_pid_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power_override").join("qmodemhelper.lock");

        {
            let _guard = LockGuard::acquire(&path).unwrap();
            let pid = fs::read_to_string(&path).unwrap();
            assert_eq!(pid, std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_lock_removed_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modem.lock");

        let result: Result<(), String> = (|| {
            let _guard = LockGuard::acquire(&path).map_err(|e| e.to_string())?;
            Err("flash failed".to_string())
        })();
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
