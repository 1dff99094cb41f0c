use serde::{Deserialize, Serialize};

use sharedfolders_core::error::SharedFoldersError;
use sharedfolders_core::{fingerprint, Fingerprint, FolderPath, QubeName, Response};

/// The recorded answer for one (source, target, folder) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub source: QubeName,
    pub target: QubeName,
    pub folder: FolderPath,
    pub response: Response,
}

impl Decision {
    pub fn new(
        source: QubeName,
        target: QubeName,
        folder: FolderPath,
        response: Response,
    ) -> Result<Self, SharedFoldersError> {
        if source == target {
            return Err(SharedFoldersError::SameQube(source.into()));
        }
        Ok(Self {
            source,
            target,
            folder,
            response,
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(
            self.source.as_str(),
            self.target.as_str(),
            self.folder.as_str(),
        )
    }

    /// True when this decision speaks for `folder` requested by `source`
    /// from `target`.
    pub fn covers(&self, source: &QubeName, target: &QubeName, folder: &FolderPath) -> bool {
        self.source == *source && self.target == *target && self.folder.contains(folder)
    }
}
