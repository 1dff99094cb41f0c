use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::atomic::SHARED_FILE_MODE;

/// Exclusive advisory lock held for one load-modify-save cycle of the
/// policy file. Released on drop.
pub struct PolicyLock {
    _flock: Flock<File>,
}

impl PolicyLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(SHARED_FILE_MODE)
            .open(path)
            .with_context(|| format!("open policy lock {}", path.display()))?;
        let flock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| anyhow!("lock {}: {errno}", path.display()))?;
        debug!(lock = %path.display(), "acquired policy lock");
        Ok(Self { _flock: flock })
    }
}
