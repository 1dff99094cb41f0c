use thiserror::Error;

use sharedfolders_core::SharedFoldersError;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// The decision itself is not acceptable; nothing was recorded.
    #[error(transparent)]
    Invalid(#[from] SharedFoldersError),

    /// The policy file or a grant could not be written. The caller must not
    /// report the decision as accepted.
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
