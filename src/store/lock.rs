//! Cooperative, cross-process lock on a file.
//!
//! The lock is a sibling `<file>.lock` created with `create_new`, so exactly one
//! holder can exist at a time among writers that use this module. A holder
//! refreshes the lock's modification time every `stale / 2`; a lock whose
//! modification time is older than `stale` is treated as abandoned and
//! reclaimed. Reclaimers serialize on a second `<file>.lock.reclaim` guard and
//! re-check staleness while holding it, so a lock created after someone else's
//! reclaim is never removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::error::StoreError;

/// Staleness and retry policy for [`FileLock::acquire`].
#[derive(Debug, Clone, PartialEq)]
pub struct LockConfig {
    pub stale: Duration,
    pub retries: u32,
    pub factor: f64,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale: Duration::from_millis(10_000),
            retries: 3,
            factor: 2.0,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1_000),
        }
    }
}

impl LockConfig {
    /// Delay before retry number `attempt` (zero based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.min_backoff.as_nanos() as f64 * self.factor.powi(attempt as i32);
        Duration::from_nanos(scaled.round() as u64).min(self.max_backoff)
    }
}

pub fn lock_path_for(target: &Path) -> PathBuf {
    with_suffix(target, ".lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// A held lock. Call [`FileLock::release`]; dropping it releases on a best
/// effort basis.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    heartbeat: JoinHandle<()>,
    released: bool,
}

enum Holder {
    Live,
    Abandoned,
    Gone,
}

impl FileLock {
    #[instrument(name = "acquire_lock", skip(target, config), fields(path = %target.display()))]
    pub async fn acquire(target: &Path, config: &LockConfig) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(target);
        let mut attempt = 0;

        loop {
            let open = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;

            match open {
                Ok(file) => {
                    debug!(attempt, "Lock acquired");
                    let file = file.into_std().await;
                    return Ok(Self {
                        heartbeat: spawn_heartbeat(file, config.stale / 2),
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if reclaim_if_abandoned(&lock_path, config.stale).await? {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if attempt >= config.retries {
                return Err(StoreError::LockBusy {
                    path: target.display().to_string(),
                    attempts: attempt + 1,
                });
            }
            let delay = config.backoff(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Lock busy, backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    #[allow(dead_code)]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub async fn release(mut self) -> Result<(), StoreError> {
        self.heartbeat.abort();
        self.released = true;
        match tokio::fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::LockRelease(format!(
                "{} was removed while held",
                self.lock_path.display()
            ))),
            Err(e) => Err(StoreError::LockRelease(e.to_string())),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.heartbeat.abort();
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

async fn inspect_holder(lock_path: &Path, stale: Duration) -> Result<Holder, StoreError> {
    let modified = match tokio::fs::metadata(lock_path).await {
        Ok(meta) => meta.modified()?,
        // Released between our create attempt and now.
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Holder::Gone),
        Err(e) => return Err(e.into()),
    };
    let age = SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO);
    Ok(if age > stale { Holder::Abandoned } else { Holder::Live })
}

/// Removes `lock_path` if its holder is gone. Returns `true` when the lock path
/// is free to be created again.
async fn reclaim_if_abandoned(lock_path: &Path, stale: Duration) -> Result<bool, StoreError> {
    match inspect_holder(lock_path, stale).await? {
        Holder::Live => return Ok(false),
        Holder::Gone => return Ok(true),
        Holder::Abandoned => {}
    }

    let guard_path = with_suffix(lock_path, ".reclaim");
    let guard = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&guard_path)
        .await;
    match guard {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // Only a reclaimer that died mid-reclaim leaves the guard behind.
            if let Holder::Abandoned = inspect_holder(&guard_path, stale).await? {
                warn!(guard = %guard_path.display(), "Removing abandoned reclaim guard");
                remove_if_present(&guard_path).await?;
            }
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    let reclaimed = match inspect_holder(lock_path, stale).await {
        Ok(Holder::Abandoned) => {
            warn!(lock = %lock_path.display(), "Reclaiming stale lock");
            remove_if_present(lock_path).await.map(|()| true)
        }
        // Freed by someone else; a new holder may already be creating it.
        Ok(Holder::Gone) => Ok(true),
        Ok(Holder::Live) => Ok(false),
        Err(e) => Err(e),
    };
    remove_if_present(&guard_path).await?;
    reclaimed
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn spawn_heartbeat(file: std::fs::File, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = file.set_modified(SystemTime::now()) {
                warn!(error = %e, "Failed to refresh lock");
            }
        }
    })
}
