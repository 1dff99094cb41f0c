use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::warn;

use sharedfolders_core::error::SharedFoldersError;
use sharedfolders_core::{fingerprint, Fingerprint, FolderPath, QubeName, QubeRegistry, Response};

use crate::decision::Decision;

/// Every decision the user has made, keyed by the decision's own
/// fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionMatrix {
    decisions: BTreeMap<Fingerprint, Decision>,
}

impl DecisionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Decision> {
        self.decisions.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.decisions.contains_key(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &Decision)> {
        self.decisions.iter()
    }

    /// Stores `decision` under its fingerprint, replacing any earlier answer
    /// for the same triple.
    pub fn insert(&mut self, decision: Decision) -> Fingerprint {
        let key = decision.fingerprint();
        self.decisions.insert(key.clone(), decision);
        key
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<Decision> {
        self.decisions.remove(fingerprint)
    }

    /// Finds the decision governing `folder` for `source` -> `target`.
    ///
    /// Candidates are decisions whose folder contains `folder`. They are
    /// walked from the most specific to the least specific and the first
    /// allow wins; if nothing allows, the most specific candidate is
    /// returned. Without any candidate the fingerprint of the query itself
    /// is returned so the caller can record a new decision under it.
    pub fn lookup_decision(
        &self,
        source: &QubeName,
        target: &QubeName,
        folder: &FolderPath,
    ) -> (Option<Decision>, Fingerprint) {
        let mut matches: Vec<(&Fingerprint, &Decision)> = self
            .decisions
            .iter()
            .filter(|(_, decision)| decision.covers(source, target, folder))
            .collect();
        matches.sort_by(|(_, a), (_, b)| b.folder.len().cmp(&a.folder.len()));

        let chosen = matches
            .iter()
            .find(|(_, decision)| decision.response.is_allow())
            .or_else(|| matches.first());

        match chosen {
            Some((key, decision)) => (Some((*decision).clone()), (*key).clone()),
            None => (
                None,
                fingerprint(source.as_str(), target.as_str(), folder.as_str()),
            ),
        }
    }

    pub fn check_decision(
        registry: &dyn QubeRegistry,
        source: &QubeName,
        target: &QubeName,
        response: Response,
    ) -> Result<(), SharedFoldersError> {
        if source == target {
            return Err(SharedFoldersError::SameQube(source.to_string()));
        }
        for qube in [source, target] {
            if !registry.exists(qube)? {
                return Err(SharedFoldersError::UnknownQube(qube.to_string()));
            }
        }
        let durable_allow = response.is_allow() && !response.is_onetime();
        if durable_allow && (source.is_disposable() || target.is_disposable()) {
            return Err(SharedFoldersError::DisposableGrant);
        }
        Ok(())
    }

    /// Records a response for the triple and returns the key it was stored
    /// under.
    ///
    /// `Block` means "refuse this qube entirely": it is stored as an
    /// always-deny on `/`, so the returned fingerprint is that of the root
    /// folder rather than of the requested one.
    pub fn add_decision(
        &mut self,
        registry: &dyn QubeRegistry,
        source: &QubeName,
        target: &QubeName,
        folder: &FolderPath,
        response: Response,
    ) -> Result<Fingerprint, SharedFoldersError> {
        Self::check_decision(registry, source, target, response)?;
        let (folder, response) = match response {
            Response::Block => (FolderPath::root(), Response::DenyAlways),
            other => (folder.clone(), other),
        };
        let decision = Decision::new(source.clone(), target.clone(), folder, response)?;
        Ok(self.insert(decision))
    }

    /// Renders the policy document: sorted keys at every level, four-space
    /// indentation.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let value = serde_json::to_value(&self.decisions)?;
        let mut output = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut output, formatter);
        value.serialize(&mut serializer)?;
        Ok(output)
    }

    /// Parses a policy document. Entries not stored under their own
    /// fingerprint are dropped.
    pub fn from_json(contents: &[u8]) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, Decision> = serde_json::from_slice(contents)?;
        let mut matrix = Self::new();
        for (key, decision) in raw {
            if decision.source == decision.target {
                warn!(%key, "dropping policy entry with identical source and target");
                continue;
            }
            let expected = decision.fingerprint();
            if key != expected.as_str() {
                warn!(%key, %expected, "dropping policy entry stored under a foreign key");
                continue;
            }
            matrix.decisions.insert(expected, decision);
        }
        Ok(matrix)
    }
}
