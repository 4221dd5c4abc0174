//! Advisory run lock shared by invocations that use the same layout.
//!
//! Two runs with the same staging directory would otherwise race on its
//! creation and removal and on the archive rename. The lock is an exclusive
//! file lock on a sibling file. Releasing it unlinks the file, so nothing is
//! left next to the archive once a run ends.
use anyhow::{Context, Result};
use std::fs::{self, File, Metadata, OpenOptions, TryLockError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Held exclusive lock; dropping it removes the lock file and unlocks.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Unlink before the handle closes; waiters see the path moved on and
        // reopen it.
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(lock = %self.path.display(), "run lock released"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                lock = %self.path.display(),
                error = %err,
                "failed to remove lock file"
            ),
        }
    }
}

/// Block until the exclusive lock at `path` is held.
pub fn acquire_run_lock(path: &Path) -> Result<RunLock> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut announced = false;
    loop {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("open lock {}", path.display()))?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                if !announced {
                    tracing::info!(lock = %path.display(), "another run holds the lock; waiting");
                    announced = true;
                }
                lock_blocking(&file, path)?;
            }
            Err(TryLockError::Error(err)) => {
                return Err(err).with_context(|| format!("lock {}", path.display()));
            }
        }

        // The previous holder may have unlinked the file we were waiting on.
        if still_linked(&file, path)? {
            tracing::debug!(lock = %path.display(), "run lock acquired");
            return Ok(RunLock {
                _file: file,
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(lock = %path.display(), "lock file replaced while waiting; retrying");
    }
}

fn lock_blocking(file: &File, path: &Path) -> Result<()> {
    loop {
        match file.lock() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).with_context(|| format!("lock {}", path.display())),
        }
    }
}

fn still_linked(file: &File, path: &Path) -> Result<bool> {
    let held = file
        .metadata()
        .with_context(|| format!("stat lock {}", path.display()))?;
    match fs::metadata(path) {
        Ok(current) => Ok(same_file(&held, &current)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("stat lock {}", path.display())),
    }
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &Metadata, _b: &Metadata) -> bool {
    true
}

#[cfg(all(test, unix))]
mod tests {
    use super::acquire_run_lock;
    use std::fs::File;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn can_lock(path: &std::path::Path) -> bool {
        let file = File::open(path).expect("open lock file");
        file.try_lock().is_ok()
    }

    #[test]
    fn lock_is_exclusive_and_removed_on_drop() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested/.dist.lock");

        let held = acquire_run_lock(&path).expect("acquire");
        assert!(path.is_file());
        assert!(!can_lock(&path), "second lock must fail while held");

        drop(held);
        assert!(!path.exists(), "lock file must not outlive the run");

        let again = acquire_run_lock(&path).expect("reacquire");
        assert!(path.is_file());
        drop(again);
        assert!(!path.exists());
    }

    #[test]
    fn waiter_takes_over_after_release() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(".dist.lock");
        let held = acquire_run_lock(&path).expect("acquire");

        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            let lock = acquire_run_lock(&waiter_path).expect("waiter acquire");
            tx.send(waiter_path.is_file()).expect("send");
            drop(lock);
        });

        assert!(
            rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "waiter must block while the lock is held"
        );
        drop(held);
        let linked = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("waiter acquires after release");
        assert!(linked, "waiter holds a lock file that is still on disk");
        waiter.join().expect("join waiter");
        assert!(!path.exists());
    }
}
