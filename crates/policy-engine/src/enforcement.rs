//! Mirrors allow decisions into qrexec policy files.
//!
//! qrexec only lets a requesting qube call `ConnectToFolder+<fingerprint>`
//! when a policy file for that exact argument exists. One file is kept per
//! allowed fingerprint; everything else under the same prefix is removed.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;

use sharedfolders_core::config::PolicyConfig;
use sharedfolders_core::Fingerprint;

use crate::atomic::{write_atomically, SHARED_FILE_MODE};
use crate::decision::Decision;
use crate::matrix::DecisionMatrix;

/// Temp files this old were left by a writer that never reached its rename.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GrantPropagator {
    dir: PathBuf,
    prefix: String,
}

impl GrantPropagator {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            dir: config.grant_dir.clone(),
            prefix: config.grant_prefix.clone(),
        }
    }

    pub fn grant_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}+{}", self.prefix, fingerprint))
    }

    /// Brings the grant directory in line with `matrix`. Safe to run any
    /// number of times.
    pub fn apply(&self, matrix: &DecisionMatrix) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create grant dir {}", self.dir.display()))?;
        let mut stale = self.existing_grants()?;
        for (fingerprint, decision) in matrix.iter() {
            stale.remove(fingerprint);
            if decision.response.is_allow() {
                self.grant_for(fingerprint, decision)?;
            } else {
                self.revoke_for(fingerprint)?;
            }
        }
        for fingerprint in stale {
            self.revoke_for(&fingerprint)?;
        }
        self.sweep_temp_files()
    }

    /// Removes `<prefix>+*.tmp` files older than [`STALE_TEMP_AGE`]. Younger
    /// ones may belong to a write still in progress.
    fn sweep_temp_files(&self) -> Result<()> {
        let marker = format!("{}+", self.prefix);
        let now = SystemTime::now();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("scan grant dir {}", self.dir.display()))?;
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file()
                || !name.starts_with(marker.as_str())
                || !name.ends_with(".tmp")
            {
                continue;
            }
            let age = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age >= STALE_TEMP_AGE) {
                remove_leftover(entry.path())?;
            }
        }
        Ok(())
    }

    /// Fingerprints that currently have a grant file.
    pub fn existing_grants(&self) -> Result<BTreeSet<Fingerprint>> {
        let marker = format!("{}+", self.prefix);
        let mut grants = BTreeSet::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("scan grant dir {}", self.dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            // temp files carry a suffix and never parse as a fingerprint
            let parsed = name
                .strip_prefix(marker.as_str())
                .map(str::parse::<Fingerprint>);
            if let Some(Ok(fingerprint)) = parsed {
                grants.insert(fingerprint);
            }
        }
        Ok(grants)
    }

    fn grant_for(&self, fingerprint: &Fingerprint, decision: &Decision) -> Result<()> {
        let path = self.grant_path(fingerprint);
        if path.is_file() {
            return Ok(());
        }
        info!(grant = %path.display(), "creating grant");
        let contents = format!("{} {} allow", decision.source, decision.target);
        write_atomically(&path, contents.as_bytes(), SHARED_FILE_MODE)
    }

    fn revoke_for(&self, fingerprint: &Fingerprint) -> Result<()> {
        let path = self.grant_path(fingerprint);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(grant = %path.display(), "removed grant");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove grant {}", path.display())),
        }
    }
}

fn remove_leftover(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(file = %path.display(), "removed leftover temp file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}
