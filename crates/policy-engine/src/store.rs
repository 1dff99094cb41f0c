use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use sharedfolders_core::config::PolicyConfig;
use sharedfolders_core::{Fingerprint, FolderPath, QubeName, QubeRegistry, Response};

use crate::atomic::{write_atomically, SHARED_FILE_MODE};
use crate::decision::Decision;
use crate::enforcement::GrantPropagator;
use crate::error::Result;
use crate::lock::PolicyLock;
use crate::matrix::DecisionMatrix;

/// The policy file plus the grants derived from it.
///
/// Each public operation is one load-modify-save cycle. When locking is
/// enabled the cycle runs under an exclusive advisory lock; the lock never
/// spans user interaction.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    db_path: PathBuf,
    lock_enabled: bool,
    grants: GrantPropagator,
}

impl PolicyStore {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            db_path: config.db_path.clone(),
            lock_enabled: config.lock,
            grants: GrantPropagator::new(config),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn grants(&self) -> &GrantPropagator {
        &self.grants
    }

    fn lock(&self) -> Result<Option<PolicyLock>> {
        if !self.lock_enabled {
            return Ok(None);
        }
        self.ensure_parent()?;
        let mut name = self.db_path.as_os_str().to_os_string();
        name.push(".lock");
        Ok(Some(PolicyLock::acquire(Path::new(&name))?))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create policy dir {}", parent.display()))?;
        }
        Ok(())
    }

    /// Reads the policy file. A missing or unreadable file yields an empty
    /// matrix, which only forces everything to be authorized again.
    pub fn load(&self) -> DecisionMatrix {
        let contents = match fs::read(&self.db_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.db_path.display(), "no policy file yet");
                return DecisionMatrix::new();
            }
            Err(e) => {
                warn!(path = %self.db_path.display(), error = %e, "cannot read policy file, starting empty");
                return DecisionMatrix::new();
            }
        };
        DecisionMatrix::from_json(&contents).unwrap_or_else(|e| {
            warn!(path = %self.db_path.display(), error = %e, "corrupt policy file, starting empty");
            DecisionMatrix::new()
        })
    }

    pub fn save(&self, matrix: &DecisionMatrix) -> Result<()> {
        self.ensure_parent()?;
        let contents = matrix.to_json().context("render policy JSON")?;
        write_atomically(&self.db_path, &contents, SHARED_FILE_MODE)?;
        Ok(())
    }

    /// Persists `matrix`, then re-derives the grants from what was saved.
    pub fn commit(&self, matrix: &DecisionMatrix) -> Result<()> {
        self.save(matrix)?;
        self.grants.apply(matrix)?;
        Ok(())
    }

    /// Drops the decision at `fingerprint` if it was only good for one use.
    pub fn revoke_onetime_for(
        &self,
        matrix: &mut DecisionMatrix,
        fingerprint: &Fingerprint,
    ) -> Result<bool> {
        let onetime = matrix
            .get(fingerprint)
            .is_some_and(|decision| decision.response.is_onetime());
        if !onetime {
            return Ok(false);
        }
        info!(%fingerprint, "one-time decision expired, applying policy changes");
        matrix.remove(fingerprint);
        self.commit(matrix)?;
        Ok(true)
    }

    /// First half of an authorization request: find what the user already
    /// said. A one-time answer is consumed here and reported as no answer.
    pub fn lookup_prior_authorization(
        &self,
        source: &QubeName,
        target: &QubeName,
        folder: &FolderPath,
    ) -> Result<(Option<Response>, Fingerprint)> {
        let _lock = self.lock()?;
        let mut matrix = self.load();
        let (decision, fingerprint) = matrix.lookup_decision(source, target, folder);
        self.revoke_onetime_for(&mut matrix, &fingerprint)?;
        let durable = decision
            .map(|decision| decision.response)
            .filter(|response| !response.is_onetime());
        Ok((durable, fingerprint))
    }

    /// Second half of an authorization request: store the user's answer.
    pub fn record_decision(
        &self,
        registry: &dyn QubeRegistry,
        source: &QubeName,
        target: &QubeName,
        folder: &FolderPath,
        response: Response,
    ) -> Result<Fingerprint> {
        let _lock = self.lock()?;
        let mut matrix = self.load();
        let fingerprint = matrix.add_decision(registry, source, target, folder, response)?;
        self.commit(&matrix)?;
        Ok(fingerprint)
    }

    /// Checks that `requested` lies within the folder authorized under
    /// `fingerprint` and returns that authorized folder. A one-time grant is
    /// consumed by a successful check.
    pub fn lookup_decision_folder(
        &self,
        fingerprint: &Fingerprint,
        requested: &FolderPath,
    ) -> Result<Option<FolderPath>> {
        let _lock = self.lock()?;
        let mut matrix = self.load();
        let Some(decision) = matrix.get(fingerprint).cloned() else {
            info!(%fingerprint, "no decision recorded for fingerprint");
            return Ok(None);
        };
        if !decision.response.is_allow() || !decision.folder.contains(requested) {
            info!(%fingerprint, %requested, "no approved request covers folder");
            return Ok(None);
        }
        info!(%requested, authorized = %decision.folder, "requested folder is within authorized folder");
        self.revoke_onetime_for(&mut matrix, fingerprint)?;
        Ok(Some(decision.folder))
    }

    /// Removes any decision stored under `fingerprint`.
    pub fn revoke(&self, fingerprint: &Fingerprint) -> Result<Option<Decision>> {
        let _lock = self.lock()?;
        let mut matrix = self.load();
        let removed = matrix.remove(fingerprint);
        if removed.is_some() {
            self.commit(&matrix)?;
        }
        Ok(removed)
    }

    /// Re-derives every grant from the policy file as it is on disk.
    pub fn sync(&self) -> Result<DecisionMatrix> {
        let _lock = self.lock()?;
        let matrix = self.load();
        self.grants.apply(&matrix)?;
        Ok(matrix)
    }
}
