use thiserror::Error;

/// Exit status for failures that are neither bad input nor a refusal.
pub const FAILURE_EXIT: i32 = 4;

#[derive(Debug, Error)]
pub enum SharedFoldersError {
    #[error("invalid qube name: {0:?}")]
    InvalidQubeName(String),
    #[error("the qube {0} does not exist")]
    UnknownQube(String),
    #[error("the source qube {0} cannot be the same as the target qube")]
    SameQube(String),
    #[error("the path {0:?} must be a canonical absolute path")]
    InvalidPath(String),
    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),
    #[error("unknown response: {0:?}")]
    UnknownResponse(String),
    #[error("permanent grants are not allowed for disposable qubes")]
    DisposableGrant,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("qube registry unavailable: {0}")]
    Registry(String),
}
